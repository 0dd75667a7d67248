use crate::{
    cache::{QueryCache, QuerySnapshot},
    config::{BLOCK_TIME_SECONDS, Dao},
    endpoints::{ServiceKind, resolve_endpoints},
    executor::{self, FetchError, Fetched, RetryPolicy},
    store::SettingsStore,
};
use reqwest::Client;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

const BLOCK_STALE_AFTER: Duration = Duration::from_secs(10);
const BLOCK_KEY: &str = "ethereum:block";

#[derive(Debug, Deserialize)]
struct JsonRpcEnvelope {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

async fn call(
    client: &Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, FetchError> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        }))
        .send()
        .await
        .map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    let envelope: JsonRpcEnvelope =
        response.json().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(error) = envelope.error {
        return Err(FetchError::Malformed {
            url: url.to_string(),
            reason: format!("RPC error {}: {}", error.code, error.message),
        });
    }

    envelope.result.ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "response carried neither result nor error".to_string(),
    })
}

fn parse_hex_quantity(value: &serde_json::Value, url: &str) -> Result<u64, FetchError> {
    let text = value.as_str().ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: format!("expected a hex quantity, got {value}"),
    })?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: format!("invalid hex quantity {text}: {e}"),
    })
}

pub fn seconds_until_block(target_block: u64, current_block: u64) -> u64 {
    target_block.saturating_sub(current_block) * BLOCK_TIME_SECONDS
}

/// Human countdown to a future block at the average block time.
pub fn time_until_block(target_block: u64, current_block: u64) -> String {
    let seconds_left = seconds_until_block(target_block, current_block);
    if seconds_left == 0 {
        return "Ended".to_string();
    }

    let days = seconds_left / 86_400;
    let hours = (seconds_left % 86_400) / 3_600;
    let minutes = (seconds_left % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Live chain reads over an ordered list of JSON-RPC endpoints. Both DAOs
/// live on mainnet, so the block cache is shared across domain contexts.
pub struct ChainService {
    client: Client,
    store: Arc<SettingsStore>,
    policy: RetryPolicy,
    block_cache: QueryCache<u64>,
}

impl ChainService {
    pub fn new(client: Client, store: Arc<SettingsStore>) -> Self {
        Self {
            client,
            store,
            policy: RetryPolicy::new(3).with_max_delay(Duration::from_secs(5)),
            block_cache: QueryCache::new("current_block", BLOCK_STALE_AFTER),
        }
    }

    #[instrument(skip(self))]
    pub async fn current_block(&self) -> QuerySnapshot<u64> {
        let candidates = self.rpc_candidates();
        self.load_current_block(candidates, false).await
    }

    #[instrument(skip(self))]
    pub async fn refresh_current_block(&self) -> QuerySnapshot<u64> {
        let candidates = self.rpc_candidates();
        self.load_current_block(candidates, true).await
    }

    fn rpc_candidates(&self) -> Vec<String> {
        // The chain RPC configuration is DAO-independent; either context
        // resolves the same list.
        resolve_endpoints(Dao::Nouns, ServiceKind::ChainRpc, &self.store.current())
    }

    async fn load_current_block(&self, candidates: Vec<String>, force: bool) -> QuerySnapshot<u64> {
        let client = self.client.clone();
        let policy = self.policy.clone();

        let loader = move || async move {
            executor::execute("current_block", &candidates, &policy, move |url| {
                let client = client.clone();
                async move {
                    let result =
                        call(&client, &url, "eth_blockNumber", serde_json::json!([])).await?;
                    parse_hex_quantity(&result, &url)
                }
            })
            .await
            .map(Fetched::live)
        };

        if force {
            self.block_cache.refresh(BLOCK_KEY, loader).await
        } else {
            self.block_cache.fetch(BLOCK_KEY, loader).await
        }
    }

    /// Timestamp of a mined block. Uncached: callers ask for historical
    /// blocks ad hoc and the answer never changes.
    #[instrument(skip(self))]
    pub async fn block_timestamp(&self, block_number: u64) -> Result<u64, FetchError> {
        let candidates = self.rpc_candidates();
        let client = self.client.clone();

        executor::execute("block_timestamp", &candidates, &self.policy, move |url| {
            let client = client.clone();
            async move {
                let result = call(
                    &client,
                    &url,
                    "eth_getBlockByNumber",
                    serde_json::json!([format!("0x{block_number:x}"), false]),
                )
                .await?;
                if result.is_null() {
                    // Nodes lag each other; another candidate may have it.
                    return Err(FetchError::Malformed {
                        url: url.clone(),
                        reason: format!("block 0x{block_number:x} not yet available"),
                    });
                }
                parse_hex_quantity(&result["timestamp"], &url)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn test_store(name: &str) -> Arc<SettingsStore> {
        let path = std::env::temp_dir().join(format!(
            "nouniverse-chain-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(SettingsStore::load_from(path))
    }

    fn fast_service(store: Arc<SettingsStore>) -> ChainService {
        let mut service = ChainService::new(Client::new(), store);
        service.policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        service
    }

    #[test]
    fn hex_quantities_parse() {
        let value = serde_json::json!("0x11a55f0");
        assert_eq!(parse_hex_quantity(&value, "test").unwrap(), 18_500_000);

        let bogus = serde_json::json!(42);
        assert!(parse_hex_quantity(&bogus, "test").is_err());
    }

    #[test]
    fn countdown_covers_the_voting_period() {
        // 32000 blocks at 12s per block is just under four and a half days.
        assert_eq!(seconds_until_block(18_532_000, 18_500_000), 384_000);
        assert_eq!(time_until_block(18_532_000, 18_500_000), "4d 10h");

        assert_eq!(time_until_block(100, 100), "Ended");
        assert_eq!(time_until_block(90, 100), "Ended");
        assert_eq!(time_until_block(100, 99), "0m");
        assert_eq!(time_until_block(1_000, 100), "3h 0m");
    }

    #[tokio::test]
    async fn backup_answers_when_primary_errors() {
        let mut primary = Server::new_async().await;
        let mut backup = Server::new_async().await;

        let primary_mock = primary
            .mock("POST", "/")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let backup_mock = backup
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc": "2.0", "id": 1, "result": "0x11a55f0"}"#)
            .create_async()
            .await;

        let service = fast_service(test_store("backup"));
        let snapshot = service
            .load_current_block(vec![primary.url(), backup.url()], false)
            .await;

        assert_eq!(snapshot.data, Some(18_500_000));
        assert!(snapshot.error.is_none());
        primary_mock.assert_async().await;
        backup_mock.assert_async().await;
    }

    #[tokio::test]
    async fn rpc_error_objects_fail_the_attempt() {
        let mut primary = Server::new_async().await;
        let mut backup = Server::new_async().await;

        primary
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "head not available"}}"#)
            .expect_at_least(1)
            .create_async()
            .await;
        backup
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc": "2.0", "id": 1, "result": "0x10"}"#)
            .create_async()
            .await;

        let service = fast_service(test_store("rpcerror"));
        let snapshot = service
            .load_current_block(vec![primary.url(), backup.url()], false)
            .await;

        assert_eq!(snapshot.data, Some(16));
    }

    #[tokio::test]
    async fn block_timestamp_reads_the_block_header() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc": "2.0", "id": 1, "result": {"number": "0x11a55f0", "timestamp": "0x65f00000"}}"#,
            )
            .create_async()
            .await;

        let store = test_store("timestamp");
        store.set_rpc_override(Some(server.url())).unwrap();
        let service = fast_service(store);

        let timestamp = service.block_timestamp(18_500_000).await.unwrap();
        assert_eq!(timestamp, 0x65f0_0000);
    }
}
