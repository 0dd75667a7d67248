use crate::{
    chain,
    models::{auctions::Auction, delegates::Delegate, proposals::Proposal},
};
use serde::Serialize;

fn wei_to_eth(wei: &str) -> f64 {
    wei.parse::<u128>().map(|w| w as f64 / 1e18).unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSummary {
    pub noun_id: String,
    pub current_bid_eth: f64,
    pub time_left: String,
    pub bid_count: usize,
}

/// Live-auction widget line items.
pub fn auction_summary(auction: &Auction, now_unix: i64) -> AuctionSummary {
    let end = auction.end_time.parse::<i64>().unwrap_or(now_unix);
    let remaining = end - now_unix;
    let time_left = if remaining <= 0 {
        "Ended".to_string()
    } else {
        format!("{}h {}m", remaining / 3_600, (remaining % 3_600) / 60)
    };

    AuctionSummary {
        noun_id: auction.noun.id.clone(),
        current_bid_eth: wei_to_eth(&auction.amount),
        time_left,
        bid_count: auction.bids.len(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalCountdown {
    pub id: String,
    pub title: Option<String>,
    pub time_left: String,
    pub for_votes: f64,
    pub against_votes: f64,
}

/// Countdown rows for the active-proposals widget.
pub fn proposal_countdowns(proposals: &[Proposal], current_block: u64) -> Vec<ProposalCountdown> {
    proposals
        .iter()
        .map(|proposal| {
            let end_block = proposal.end_block.parse::<u64>().unwrap_or(current_block);
            ProposalCountdown {
                id: proposal.id.clone(),
                title: proposal.title.clone(),
                time_left: chain::time_until_block(end_block, current_block),
                for_votes: wei_to_eth(&proposal.for_votes),
                against_votes: wei_to_eth(&proposal.against_votes),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotingPowerSummary {
    pub delegate_count: usize,
    pub total_votes: f64,
    pub token_holders_represented: i64,
}

/// Aggregate voting power of the user's favorite delegates.
pub fn favorite_voting_power(delegates: &[Delegate], favorites: &[String]) -> VotingPowerSummary {
    let favored: Vec<&Delegate> = delegates
        .iter()
        .filter(|delegate| {
            favorites
                .iter()
                .any(|id| id.eq_ignore_ascii_case(&delegate.id))
        })
        .collect();

    VotingPowerSummary {
        delegate_count: favored.len(),
        total_votes: favored
            .iter()
            .map(|delegate| delegate.delegated_votes.parse::<f64>().unwrap_or(0.0))
            .sum(),
        token_holders_represented: favored
            .iter()
            .map(|delegate| delegate.token_holders_represented_amount)
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auctions::{Noun, NounSeed};

    fn auction(amount: &str, end_time: i64) -> Auction {
        Auction {
            id: "1".to_string(),
            amount: amount.to_string(),
            start_time: "0".to_string(),
            end_time: end_time.to_string(),
            bidder: None,
            settled: false,
            noun: Noun {
                id: "1001".to_string(),
                owner: "0x0000000000000000000000000000000000000000".to_string(),
                seed: NounSeed {
                    background: 0,
                    body: 0,
                    accessory: 0,
                    head: 0,
                    glasses: 0,
                },
            },
            bids: Vec::new(),
        }
    }

    fn delegate(id: &str, votes: &str, holders: i64) -> Delegate {
        Delegate {
            id: id.to_string(),
            delegated_votes: votes.to_string(),
            delegated_votes_raw: "0".to_string(),
            token_holders_represented_amount: holders,
            nouns_represented: Vec::new(),
            votes: Vec::new(),
            proposals: Vec::new(),
        }
    }

    #[test]
    fn auction_summary_formats_bid_and_countdown() {
        let now = 1_700_000_000;
        let summary = auction_summary(&auction("2400000000000000000", now + 5_400), now);
        assert_eq!(summary.noun_id, "1001");
        assert!((summary.current_bid_eth - 2.4).abs() < 1e-9);
        assert_eq!(summary.time_left, "1h 30m");

        let ended = auction_summary(&auction("0", now - 60), now);
        assert_eq!(ended.time_left, "Ended");
    }

    #[test]
    fn proposal_countdowns_use_block_math() {
        let mut proposal = crate::degraded::mock_proposals(1).remove(0);
        proposal.end_block = "18532000".to_string();
        proposal.for_votes = "75000000000000000000".to_string();
        proposal.against_votes = "25000000000000000000".to_string();

        let rows = proposal_countdowns(&[proposal], 18_500_000);
        assert_eq!(rows[0].time_left, "4d 10h");
        assert!((rows[0].for_votes - 75.0).abs() < 1e-9);
        assert!((rows[0].against_votes - 25.0).abs() < 1e-9);
    }

    #[test]
    fn favorite_voting_power_sums_only_favorites() {
        let delegates = vec![
            delegate("0xAAA0000000000000000000000000000000000001", "12.5", 3),
            delegate("0xaaa0000000000000000000000000000000000002", "7.5", 2),
            delegate("0xaaa0000000000000000000000000000000000003", "100", 9),
        ];
        let favorites = vec![
            // Favorites are matched case-insensitively.
            "0xaaa0000000000000000000000000000000000001".to_string(),
            "0xAAA0000000000000000000000000000000000002".to_string(),
        ];

        let summary = favorite_voting_power(&delegates, &favorites);
        assert_eq!(summary.delegate_count, 2);
        assert!((summary.total_votes - 20.0).abs() < 1e-9);
        assert_eq!(summary.token_holders_represented, 5);
    }
}
