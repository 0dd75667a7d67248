use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NounSeed {
    pub background: u32,
    pub body: u32,
    pub accessory: u32,
    pub head: u32,
    pub glasses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Noun {
    pub id: String,
    pub owner: String,
    pub seed: NounSeed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: String,
    pub amount: String,
    pub bidder: String,
    pub block_number: String,
    pub block_timestamp: String,
    pub txn_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: String,
    /// Current (or winning, once settled) bid in wei.
    pub amount: String,
    pub start_time: String,
    pub end_time: String,
    pub bidder: Option<String>,
    pub settled: bool,
    pub noun: Noun,
    #[serde(default)]
    pub bids: Vec<Bid>,
}

#[derive(Debug, Deserialize)]
pub struct AuctionsData {
    pub auctions: Vec<Auction>,
}
