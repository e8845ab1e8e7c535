use chrono::Utc;
use log::debug;
use reqwest::multipart;
use serde::Deserialize;
use shared::models::storage::{StorePayload, StoredObject};
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("content store unreachable: {0}")]
    Unavailable(String),
    #[error("content store request timed out")]
    Timeout,
    #[error("no object for content id {0}")]
    NotFound(String),
    #[error("unexpected content store response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size")]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
}

/// Bridge to the IPFS HTTP API. Content ids come back from the daemon, so
/// identical bytes always map to the identical id; repeated puts of the
/// same payload are safe.
#[derive(Clone)]
pub struct IpfsClient {
    api_url: String,
    gateway_url: String,
    client: reqwest::Client,
}

impl IpfsClient {
    pub fn new(
        api_url: &str,
        gateway_url: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Stores the payload's canonical bytes and returns the resulting
    /// content id.
    pub async fn put(&self, payload: &StorePayload) -> Result<StoredObject, StoreError> {
        let bytes = payload.canonical_bytes();
        let local_size = bytes.len() as u64;

        let part = multipart::Part::bytes(bytes).file_name("payload");
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/add", self.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(StoreError::InvalidResponse(format!(
                "add returned status {}",
                response.status()
            )));
        }

        let parsed: AddResponse = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;

        debug!("stored {local_size} bytes as {}", parsed.hash);
        Ok(StoredObject {
            content_id: parsed.hash,
            size_bytes: parsed
                .size
                .and_then(|size| size.parse().ok())
                .unwrap_or(local_size),
            stored_at: Utc::now(),
        })
    }

    /// Fetches the exact bytes behind `content_id`.
    pub async fn get(&self, content_id: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .post(format!("{}/cat", self.api_url))
            .query(&[("arg", content_id)])
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(content_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // The daemon reports unknown ids as a 500 with a lookup error.
            if body.contains("not found") || body.contains("could not find") {
                return Err(StoreError::NotFound(content_id.to_string()));
            }
            return Err(StoreError::InvalidResponse(format!(
                "cat returned status {status}: {body}"
            )));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(map_transport_error)
    }

    /// Identity of the attached daemon, for diagnostics.
    pub async fn node_id(&self) -> Result<String, StoreError> {
        let response = self
            .client
            .post(format!("{}/id", self.api_url))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(StoreError::InvalidResponse(format!(
                "id returned status {}",
                response.status()
            )));
        }

        let parsed: IdResponse = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        Ok(parsed.id)
    }

    pub fn gateway_url_for(&self, content_id: &str) -> String {
        format!("{}/{content_id}", self.gateway_url)
    }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Unavailable(err.to_string())
    }
}
