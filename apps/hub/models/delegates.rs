use crate::models::auctions::Noun;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateVote {
    pub id: String,
    pub support: bool,
    pub votes: String,
    pub proposal: ProposalRef,
    pub block_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRef {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateProposal {
    pub id: String,
    pub title: Option<String>,
    pub status: String,
    pub created_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegate {
    /// Delegate account address, doubling as the entity id.
    pub id: String,
    pub delegated_votes: String,
    pub delegated_votes_raw: String,
    pub token_holders_represented_amount: i64,
    #[serde(default)]
    pub nouns_represented: Vec<Noun>,
    #[serde(default)]
    pub votes: Vec<DelegateVote>,
    #[serde(default)]
    pub proposals: Vec<DelegateProposal>,
}

#[derive(Debug, Deserialize)]
pub struct DelegatesData {
    pub delegates: Vec<Delegate>,
}
