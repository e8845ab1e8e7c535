use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payload committed to content-addressed storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObject {
    pub content_id: String,
    pub size_bytes: u64,
    pub stored_at: DateTime<Utc>,
}

/// Payload accepted by the store bridge, resolved once at the HTTP boundary.
///
/// Structured payloads are serialized with stable key ordering so that
/// logically-equal inputs map to identical bytes and therefore identical
/// content ids.
#[derive(Debug, Clone, PartialEq)]
pub enum StorePayload {
    Text(String),
    Binary(Vec<u8>),
    Structured(serde_json::Value),
}

impl StorePayload {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            StorePayload::Text(text) => text.as_bytes().to_vec(),
            StorePayload::Binary(bytes) => bytes.clone(),
            StorePayload::Structured(value) => canonical_json_bytes(value),
        }
    }
}

/// Serializes a JSON value with object keys sorted at every depth.
pub fn canonical_json_bytes(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&sort_keys(value)).unwrap_or_default()
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: serde_json::Map<String, serde_json::Value> = keys
                .into_iter()
                .map(|key| (key.clone(), sort_keys(&map[key])))
                .collect();
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PayloadError {
    #[error("provide exactly one of `content`, `content_base64` or `structured`")]
    AmbiguousPayload,
    #[error("invalid base64 content: {0}")]
    InvalidBase64(String),
}

/// Body of `POST /ipfs/add`. Exactly one of the fields must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddPayloadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl AddPayloadRequest {
    pub fn into_payload(self) -> Result<StorePayload, PayloadError> {
        match (self.content, self.content_base64, self.structured) {
            (Some(text), None, None) => Ok(StorePayload::Text(text)),
            (None, Some(encoded), None) => base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map(StorePayload::Binary)
                .map_err(|e| PayloadError::InvalidBase64(e.to_string())),
            (None, None, Some(value)) => Ok(StorePayload::Structured(value)),
            _ => Err(PayloadError::AmbiguousPayload),
        }
    }
}
