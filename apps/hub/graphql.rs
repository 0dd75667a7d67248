use crate::executor::FetchError;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// POST a GraphQL document and unwrap the `{data, errors}` envelope.
/// Query-level errors count as malformed responses so the executor treats
/// them like any other failed attempt.
pub async fn post_query<T>(client: &Client, url: &str, query: &str) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(&serde_json::json!({ "query": query }))
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

    let envelope: GraphQlResponse<T> =
        response.json().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(error) = envelope.errors.first() {
        return Err(FetchError::Malformed {
            url: url.to_string(),
            reason: error.message.clone(),
        });
    }

    envelope.data.ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "response carried neither data nor errors".to_string(),
    })
}
