use serde::{Deserialize, Serialize};

fn default_max_length() -> u32 {
    100
}

fn default_temperature() -> f32 {
    0.7
}

fn default_dimension() -> u32 {
    512
}

fn default_inference_steps() -> u32 {
    50
}

fn default_guidance_scale() -> f32 {
    7.5
}

/// Body of `POST /generate/text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationRequest {
    pub prompt: String,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub store_on_ipfs: bool,
}

/// Body of `POST /generate/image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default)]
    pub store_on_ipfs: bool,
}

/// A completed text generation. `content_id` is present iff the result was
/// persisted; `storage_error` is set when persistence was requested but
/// failed, in which case the generated text is still returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationResponse {
    pub text: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_gateway_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub image_base64: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_gateway_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}
