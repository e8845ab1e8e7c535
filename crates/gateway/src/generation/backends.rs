use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::generation::{ImageGenerationRequest, TextGenerationRequest};
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Unavailable(String),
    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Client for a distributed text-inference swarm.
#[async_trait]
pub trait TextBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &TextGenerationRequest) -> Result<String, BackendError>;

    async fn peers(&self) -> Result<Vec<PeerInfo>, BackendError>;

    async fn is_ready(&self) -> bool;
}

/// Client for a diffusion image-inference service. Generated images travel
/// as base64-encoded PNG.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &ImageGenerationRequest) -> Result<String, BackendError>;

    async fn is_ready(&self) -> bool;
}

#[derive(Serialize)]
struct TextGenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_length: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct TextGenerateReply {
    text: String,
}

#[derive(Deserialize)]
struct PeersReply {
    peers: Vec<PeerInfo>,
}

#[derive(Serialize)]
struct ImageGenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    negative_prompt: &'a str,
    height: u32,
    width: u32,
    num_inference_steps: u32,
    guidance_scale: f32,
}

#[derive(Deserialize)]
struct ImageGenerateReply {
    image_base64: String,
}

pub struct HttpTextBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpTextBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl TextBackend for HttpTextBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &TextGenerationRequest) -> Result<String, BackendError> {
        let body = TextGenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            max_length: request.max_length,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let reply: TextGenerateReply = parse_reply(response).await?;
        Ok(reply.text)
    }

    async fn peers(&self) -> Result<Vec<PeerInfo>, BackendError> {
        let response = self
            .client
            .get(format!("{}/peers", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let reply: PeersReply = parse_reply(response).await?;
        Ok(reply.peers)
    }

    async fn is_ready(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

pub struct HttpImageBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpImageBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ImageGenerationRequest) -> Result<String, BackendError> {
        let body = ImageGenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            negative_prompt: &request.negative_prompt,
            height: request.height,
            width: request.width,
            num_inference_steps: request.num_inference_steps,
            guidance_scale: request.guidance_scale,
        };

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let reply: ImageGenerateReply = parse_reply(response).await?;
        Ok(reply.image_base64)
    }

    async fn is_ready(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| BackendError::Unavailable(err.to_string()))
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Unavailable(err.to_string())
    }
}

async fn parse_reply<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // Covers model-still-loading (503) and no-available-peers replies.
        return Err(BackendError::Unavailable(format!(
            "backend returned status {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|err| BackendError::Unavailable(format!("malformed backend reply: {err}")))
}
