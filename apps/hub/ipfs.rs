use crate::config::IPFS_GATEWAYS;
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, multipart};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::{instrument, warn};
use utils::errors::{GATEWAYS_EXHAUSTED, NO_PINNING_SERVICE_CONFIGURED};

const PINATA_API_BASE: &str = "https://api.pinata.cloud";
const WEB3_STORAGE_API_BASE: &str = "https://api.web3.storage";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IpfsUpload {
    pub hash: String,
    pub url: String,
    pub gateway: String,
}

/// Content-addressed storage client: pins through whichever service has
/// credentials configured, reads through an ordered list of public gateways.
pub struct IpfsService {
    client: ClientWithMiddleware,
    pinata_api_key: Option<String>,
    pinata_secret_key: Option<String>,
    web3_storage_token: Option<String>,
    pinata_base: String,
    web3_storage_base: String,
    gateways: Vec<String>,
}

impl IpfsService {
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("PINATA_API_KEY").ok(),
            std::env::var("PINATA_SECRET_KEY").ok(),
            std::env::var("WEB3_STORAGE_TOKEN").ok(),
        )
    }

    pub fn new(
        pinata_api_key: Option<String>,
        pinata_secret_key: Option<String>,
        web3_storage_token: Option<String>,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            pinata_api_key: pinata_api_key.filter(|k| !k.is_empty()),
            pinata_secret_key: pinata_secret_key.filter(|k| !k.is_empty()),
            web3_storage_token: web3_storage_token.filter(|t| !t.is_empty()),
            pinata_base: PINATA_API_BASE.to_string(),
            web3_storage_base: WEB3_STORAGE_API_BASE.to_string(),
            gateways: IPFS_GATEWAYS.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn gateway_url(&self, hash: &str, gateway_index: usize) -> String {
        let gateway = self
            .gateways
            .get(gateway_index)
            .unwrap_or(&self.gateways[0]);
        format!("{gateway}{hash}")
    }

    pub async fn upload_json(&self, value: &serde_json::Value) -> Result<IpfsUpload> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.upload_bytes(bytes, "data.json").await
    }

    #[instrument(skip(self, bytes), fields(filename = filename, size = bytes.len()))]
    pub async fn upload_bytes(&self, bytes: Vec<u8>, filename: &str) -> Result<IpfsUpload> {
        if self.pinata_api_key.is_some() && self.pinata_secret_key.is_some() {
            match self.upload_to_pinata(bytes.clone(), filename).await {
                Ok(upload) => return Ok(upload),
                Err(e) => {
                    warn!(error = %e, "Pinata upload failed, trying web3.storage");
                }
            }
        }

        if self.web3_storage_token.is_some() {
            return self.upload_to_web3_storage(bytes, filename).await;
        }

        Err(anyhow!(NO_PINNING_SERVICE_CONFIGURED))
    }

    async fn upload_to_pinata(&self, bytes: Vec<u8>, filename: &str) -> Result<IpfsUpload> {
        let metadata = serde_json::json!({
            "name": filename,
            "keyvalues": {
                "app": "nouniverse-hub",
            },
        });
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("pinataMetadata", metadata.to_string())
            .text("pinataOptions", r#"{"cidVersion": 1}"#);

        let response = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.pinata_base))
            .header("pinata_api_key", self.pinata_api_key.as_deref().unwrap_or_default())
            .header(
                "pinata_secret_api_key",
                self.pinata_secret_key.as_deref().unwrap_or_default(),
            )
            .multipart(form)
            .send()
            .await
            .context("Pinata request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Pinata upload failed: HTTP {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let hash = body["IpfsHash"]
            .as_str()
            .context("Pinata response is missing IpfsHash")?
            .to_string();

        Ok(self.upload_result(hash))
    }

    async fn upload_to_web3_storage(&self, bytes: Vec<u8>, filename: &str) -> Result<IpfsUpload> {
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name(filename.to_string()),
        );

        let response = self
            .client
            .post(format!("{}/upload", self.web3_storage_base))
            .bearer_auth(self.web3_storage_token.as_deref().unwrap_or_default())
            .multipart(form)
            .send()
            .await
            .context("web3.storage request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "web3.storage upload failed: HTTP {}",
                response.status()
            ));
        }

        let body: serde_json::Value = response.json().await?;
        let hash = body["cid"]
            .as_str()
            .context("web3.storage response is missing cid")?
            .to_string();

        Ok(self.upload_result(hash))
    }

    fn upload_result(&self, hash: String) -> IpfsUpload {
        let gateway = self.gateways[0].clone();
        IpfsUpload {
            url: format!("{gateway}{hash}"),
            gateway,
            hash,
        }
    }

    /// Fetch pinned JSON, walking the gateway list in order.
    #[instrument(skip(self))]
    pub async fn fetch_json(&self, hash: &str) -> Result<serde_json::Value> {
        for gateway in &self.gateways {
            let url = format!("{gateway}{hash}");
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Invalid JSON from gateway {gateway}"));
                }
                Ok(response) => {
                    warn!(gateway, status = %response.status(), "Gateway returned an error");
                }
                Err(e) => {
                    warn!(gateway, error = %e, "Gateway unreachable");
                }
            }
        }
        Err(anyhow!("{}: {}", GATEWAYS_EXHAUSTED, hash))
    }
}
