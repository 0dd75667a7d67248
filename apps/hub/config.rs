use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Average Ethereum mainnet block time, used for countdown math.
pub const BLOCK_TIME_SECONDS: u64 = 12;
pub const VOTING_PERIOD_BLOCKS: u64 = 32_000;

pub const PROPOSALS_PER_PAGE: usize = 12;
pub const DELEGATES_PER_PAGE: usize = 20;
pub const AUCTIONS_PER_PAGE: usize = 10;

pub const RPC_PRIMARY_DEFAULT: &str = "https://rpc.ankr.com/eth";
pub const RPC_BACKUP_DEFAULT: &str = "https://eth.llamarpc.com";
pub const RPC_PUBLIC_URL: &str = "https://cloudflare-eth.com";

pub const IPFS_GATEWAYS: [&str; 4] = [
    "https://ipfs.io/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://dweb.link/ipfs/",
];

/// The governance instance whose data and contract addresses are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dao {
    Nouns,
    LilNouns,
}

impl Dao {
    pub fn slug(&self) -> &'static str {
        match self {
            Dao::Nouns => "nouns",
            Dao::LilNouns => "lilnouns",
        }
    }
}

impl fmt::Display for Dao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Dao {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nouns" => Ok(Dao::Nouns),
            "lilnouns" | "lil-nouns" => Ok(Dao::LilNouns),
            other => Err(anyhow::anyhow!("Unknown DAO: {}", other)),
        }
    }
}

#[derive(Clone)]
pub struct DaoConfig {
    pub subgraph_name: &'static str,
    pub subgraph_id: &'static str,
    pub graph_fallback_url: &'static str,
    pub governor_address: &'static str,
    pub auction_house_address: &'static str,
    pub token_address: &'static str,
}

// Lazily initialized static map of per-DAO configurations.
lazy_static! {
    static ref DAO_CONFIG_MAP: HashMap<Dao, DaoConfig> = {
        let mut map = HashMap::new();
        map.insert(
            Dao::Nouns,
            DaoConfig {
                subgraph_name: "nounsdao/nouns-subgraph",
                subgraph_id: "nouns",
                graph_fallback_url: "https://api.studio.thegraph.com/query/56570/nouns/version/latest",
                governor_address: "0x6f3E6272A167e8AcCb32072d08E0957F9c79223d",
                auction_house_address: "0x830BD73E4184ceF73443C15111a1DF14e495C706",
                token_address: "0x9C8fF314C9Bc7F6e59A9d9225Fb22946427eDC03",
            },
        );
        map.insert(
            Dao::LilNouns,
            DaoConfig {
                subgraph_name: "lilnounsdao/lil-nouns-subgraph",
                subgraph_id: "lil-nouns",
                graph_fallback_url: "https://api.studio.thegraph.com/query/56570/lil-nouns/version/latest",
                governor_address: "0x4b10701Bfd7BFEdc47d50562b76b436fbB5BdB3B",
                auction_house_address: "0x55e0F7A3bB39a28Bd7Bcc458e04b3cF00Ad3219E",
                token_address: "0x4b10701Bfd7BFEdc47d50562b76b436fbB5BdB3B",
            },
        );
        map
    };
}

pub fn dao_config(dao: Dao) -> &'static DaoConfig {
    DAO_CONFIG_MAP
        .get(&dao)
        .expect("All DAO variants have a config entry")
}

/// Managed gateway endpoint when an API key is configured, public endpoint
/// otherwise.
pub fn graph_endpoint(dao: Dao) -> String {
    let config = dao_config(dao);
    match std::env::var("GRAPH_API_KEY") {
        Ok(key) if !key.is_empty() => format!(
            "https://gateway-arbitrum.network.thegraph.com/api/{}/subgraphs/id/{}",
            key, config.subgraph_id
        ),
        _ => format!(
            "https://api.thegraph.com/subgraphs/name/{}",
            config.subgraph_name
        ),
    }
}

pub fn rpc_primary() -> String {
    std::env::var("ETHEREUM_RPC_URL").unwrap_or_else(|_| RPC_PRIMARY_DEFAULT.to_string())
}

pub fn rpc_backup() -> String {
    std::env::var("ETHEREUM_RPC_URL_BACKUP").unwrap_or_else(|_| RPC_BACKUP_DEFAULT.to_string())
}
