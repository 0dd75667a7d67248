use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub proposer: String,
    pub targets: Vec<String>,
    pub values: Vec<String>,
    pub signatures: Vec<String>,
    pub calldatas: Vec<String>,
    pub start_block: String,
    pub end_block: String,
    pub for_votes: String,
    pub against_votes: String,
    pub abstain_votes: String,
    pub canceled: bool,
    pub vetoed: bool,
    pub executed: bool,
    pub created_timestamp: String,
    pub created_transaction_hash: String,
    pub status: String,
    pub quorum_votes: String,
    pub total_supply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVote {
    pub id: String,
    pub voter: String,
    pub support: bool,
    pub support_detailed: i32,
    pub votes_raw: String,
    pub votes: String,
    pub reason: Option<String>,
    pub block_number: String,
    pub block_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDetails {
    #[serde(flatten)]
    pub proposal: Proposal,
    #[serde(default)]
    pub votes: Vec<ProposalVote>,
}

#[derive(Debug, Deserialize)]
pub struct ProposalsData {
    pub proposals: Vec<Proposal>,
}

#[derive(Debug, Deserialize)]
pub struct ProposalDetailsData {
    pub proposal: Option<ProposalDetails>,
}
