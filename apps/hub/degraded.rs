use crate::models::{
    auctions::{Auction, Bid, Noun, NounSeed},
    delegates::Delegate,
    proposals::Proposal,
};
use chrono::Utc;
use rand::{Rng, seq::IndexedRandom};

const STATUSES: [&str; 5] = ["ACTIVE", "EXECUTED", "DEFEATED", "PENDING", "QUEUED"];

const TITLES: [&str; 10] = [
    "Fund Community Art Initiative",
    "Upgrade DAO Treasury Management",
    "Establish Nouns Education Program",
    "Create Developer Grant Program",
    "Launch Nouns Merchandise Store",
    "Build Community Center",
    "Support Open Source Projects",
    "Expand International Outreach",
    "Develop Mobile App",
    "Host Annual Conference",
];

fn random_hex(len: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

fn random_address() -> String {
    format!("0x{}", random_hex(40))
}

fn random_tx_hash() -> String {
    format!("0x{}", random_hex(64))
}

fn random_wei(max_whole_tokens: u64) -> String {
    let mut rng = rand::rng();
    (rng.random_range(1..=max_whole_tokens as u128) * 10u128.pow(18)).to_string()
}

/// Synthetic proposal page, shaped identically to an indexer result so the
/// consuming surface needs no branching. Serves passive list views only.
pub fn mock_proposals(count: usize) -> Vec<Proposal> {
    let mut rng = rand::rng();
    let now = Utc::now().timestamp();

    (1..=count)
        .map(|i| {
            let title = TITLES.choose(&mut rng).unwrap_or(&TITLES[0]);
            let status = STATUSES.choose(&mut rng).unwrap_or(&STATUSES[0]);
            let start_block = 18_000_000 + i as u64 * 1_000;

            Proposal {
                id: i.to_string(),
                title: Some(format!("Proposal {}: {}", i, title)),
                description: Some(format!(
                    "This proposal seeks to {} for the benefit of the ecosystem. It includes a \
                     budget breakdown, an implementation timeline, and success metrics.",
                    title.to_lowercase()
                )),
                proposer: random_address(),
                targets: vec!["0x0000000000000000000000000000000000000000".to_string()],
                values: vec!["0".to_string()],
                signatures: vec![String::new()],
                calldatas: vec!["0x".to_string()],
                start_block: start_block.to_string(),
                end_block: (start_block + 32_000).to_string(),
                for_votes: random_wei(100),
                against_votes: random_wei(50),
                abstain_votes: random_wei(10),
                canceled: false,
                vetoed: false,
                executed: *status == "EXECUTED",
                created_timestamp: (now - i as i64 * 86_400).to_string(),
                created_transaction_hash: random_tx_hash(),
                status: status.to_string(),
                quorum_votes: (20u128 * 10u128.pow(18)).to_string(),
                total_supply: (1_000u128 * 10u128.pow(18)).to_string(),
            }
        })
        .collect()
}

pub fn mock_auctions(count: usize, settled: Option<bool>) -> Vec<Auction> {
    let mut rng = rand::rng();
    let now = Utc::now().timestamp();

    (1..=count)
        .map(|i| {
            let is_settled = settled.unwrap_or_else(|| rng.random_range(0..10) > 2);
            let bid_count = rng.random_range(1..=10);

            Auction {
                id: i.to_string(),
                amount: random_wei(10),
                start_time: (now - 86_400 + i as i64 * 3_600).to_string(),
                end_time: (now + 3_600 - i as i64 * 600).to_string(),
                bidder: Some(random_address()),
                settled: is_settled,
                noun: Noun {
                    id: (1_000 + i).to_string(),
                    owner: random_address(),
                    seed: NounSeed {
                        background: rng.random_range(0..10),
                        body: rng.random_range(0..10),
                        accessory: rng.random_range(0..10),
                        head: rng.random_range(0..10),
                        glasses: rng.random_range(0..10),
                    },
                },
                bids: (0..bid_count)
                    .map(|j| Bid {
                        id: format!("{}-{}", i, j),
                        amount: random_wei(5),
                        bidder: random_address(),
                        block_number: (18_000_000 + j as u64 * 100).to_string(),
                        block_timestamp: (now - 3_600 + j as i64 * 300).to_string(),
                        txn_hash: random_tx_hash(),
                    })
                    .collect(),
            }
        })
        .collect()
}

pub fn mock_delegates(count: usize) -> Vec<Delegate> {
    let mut rng = rand::rng();

    (1..=count)
        .map(|_| {
            let whole_votes = rng.random_range(10..=60u64);
            Delegate {
                id: random_address(),
                delegated_votes: whole_votes.to_string(),
                delegated_votes_raw: (whole_votes as u128 * 10u128.pow(18)).to_string(),
                token_holders_represented_amount: rng.random_range(1..=20),
                nouns_represented: Vec::new(),
                votes: Vec::new(),
                proposals: Vec::new(),
            }
        })
        .collect()
}
