pub mod backends;

use base64::Engine;
use log::{debug, warn};
use shared::models::generation::{
    ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest, TextGenerationResponse,
};
use shared::models::storage::StorePayload;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AccessClaim, Capability, PolicyGate};
use crate::error::GatewayError;
use crate::ipfs::{IpfsClient, StoreError};
use backends::{ImageBackend, TextBackend};

/// Runs a generation request through Authorizing → Delegating → Storing.
///
/// Denied requests never reach a backend. Backend failures are surfaced
/// as-is with no retry at this layer. A storage failure after a successful
/// generation never discards the generated payload; the response carries a
/// `storage_error` instead.
pub struct GenerationService {
    gate: Arc<PolicyGate>,
    text_backend: Option<Arc<dyn TextBackend>>,
    image_backend: Option<Arc<dyn ImageBackend>>,
    store: Option<Arc<IpfsClient>>,
}

impl GenerationService {
    pub fn new(
        gate: Arc<PolicyGate>,
        text_backend: Option<Arc<dyn TextBackend>>,
        image_backend: Option<Arc<dyn ImageBackend>>,
        store: Option<Arc<IpfsClient>>,
    ) -> Self {
        Self {
            gate,
            text_backend,
            image_backend,
            store,
        }
    }

    pub async fn generate_text(
        &self,
        claim: &AccessClaim,
        request: TextGenerationRequest,
    ) -> Result<TextGenerationResponse, GatewayError> {
        let request_id = Uuid::new_v4();

        self.gate.authorize(Capability::GenerateText, claim, None)?;

        let backend = self.text_backend.as_ref().ok_or_else(|| {
            GatewayError::BackendUnavailable("text backend is disabled".to_string())
        })?;

        debug!(
            "[{request_id}] delegating text generation to {}",
            backend.model_name()
        );
        let text = backend.generate(&request).await?;

        let mut response = TextGenerationResponse {
            text,
            model: backend.model_name().to_string(),
            content_id: None,
            ipfs_gateway_url: None,
            storage_error: None,
        };

        if request.store_on_ipfs {
            let payload = StorePayload::Text(response.text.clone());
            match self.store_result(payload).await {
                Ok((content_id, gateway_url)) => {
                    response.content_id = Some(content_id);
                    response.ipfs_gateway_url = Some(gateway_url);
                }
                Err(err) => {
                    warn!("[{request_id}] storing generated text failed: {err}");
                    response.storage_error = Some(err.to_string());
                }
            }
        }

        Ok(response)
    }

    pub async fn generate_image(
        &self,
        claim: &AccessClaim,
        request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse, GatewayError> {
        let request_id = Uuid::new_v4();

        self.gate.authorize(Capability::GenerateImage, claim, None)?;

        let backend = self.image_backend.as_ref().ok_or_else(|| {
            GatewayError::BackendUnavailable("image backend is disabled".to_string())
        })?;

        debug!(
            "[{request_id}] delegating image generation to {}",
            backend.model_name()
        );
        let image_base64 = backend.generate(&request).await?;

        let mut response = ImageGenerationResponse {
            image_base64,
            model: backend.model_name().to_string(),
            content_id: None,
            ipfs_gateway_url: None,
            storage_error: None,
        };

        if request.store_on_ipfs {
            match base64::engine::general_purpose::STANDARD.decode(response.image_base64.as_bytes())
            {
                Ok(image_bytes) => match self.store_result(StorePayload::Binary(image_bytes)).await
                {
                    Ok((content_id, gateway_url)) => {
                        response.content_id = Some(content_id);
                        response.ipfs_gateway_url = Some(gateway_url);
                    }
                    Err(err) => {
                        warn!("[{request_id}] storing generated image failed: {err}");
                        response.storage_error = Some(err.to_string());
                    }
                },
                Err(err) => {
                    warn!("[{request_id}] backend returned undecodable image payload: {err}");
                    response.storage_error =
                        Some(format!("backend returned undecodable image payload: {err}"));
                }
            }
        }

        Ok(response)
    }

    async fn store_result(&self, payload: StorePayload) -> Result<(String, String), StoreError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("content store not configured".to_string()))?;

        let object = store.put(&payload).await?;
        let gateway_url = store.gateway_url_for(&object.content_id);
        Ok((object.content_id, gateway_url))
    }
}

#[cfg(test)]
mod tests {
    use super::backends::mock::{MockImageBackend, MockTextBackend};
    use super::backends::BackendError;
    use super::*;
    use crate::auth::PolicyConfig;
    use alloy::primitives::Address;
    use chrono::Utc;
    use shared::models::instance::{Instance, InstanceStatus};
    use std::time::Duration;

    fn active_claim() -> AccessClaim {
        let instance = Instance {
            instance_id: "0xaaa".to_string(),
            wallet_address: Address::ZERO,
            status: InstanceStatus::Active,
            registered_at: Utc::now(),
            last_verified_at: Utc::now(),
        };
        AccessClaim {
            instance_id: Some(instance.instance_id.clone()),
            instance: Some(instance),
        }
    }

    fn gate(require_wallet: bool) -> Arc<PolicyGate> {
        Arc::new(PolicyGate::new(PolicyConfig {
            require_wallet,
            allowed_addresses: vec![],
        }))
    }

    fn text_request(store_on_ipfs: bool) -> TextGenerationRequest {
        TextGenerationRequest {
            prompt: "Hello".to_string(),
            max_length: 100,
            temperature: 0.7,
            store_on_ipfs,
        }
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_backend() {
        let backend = Arc::new(MockTextBackend::replying("Hello world"));
        let service = GenerationService::new(gate(true), Some(backend.clone()), None, None);

        let result = service
            .generate_text(&AccessClaim::default(), text_request(false))
            .await;

        assert!(matches!(result, Err(GatewayError::Unauthorized(_))));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_text_without_storage() {
        let backend = Arc::new(MockTextBackend::replying("Hello world"));
        let service = GenerationService::new(gate(true), Some(backend.clone()), None, None);

        let response = service
            .generate_text(&active_claim(), text_request(false))
            .await
            .unwrap();

        assert_eq!(response.text, "Hello world");
        assert_eq!(response.model, "mock/text-model");
        assert!(response.content_id.is_none());
        assert!(response.storage_error.is_none());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_unchanged() {
        let backend = Arc::new(MockTextBackend::failing(BackendError::Timeout));
        let service = GenerationService::new(gate(false), Some(backend.clone()), None, None);

        let result = service
            .generate_text(&AccessClaim::default(), text_request(false))
            .await;
        assert!(matches!(result, Err(GatewayError::BackendTimeout)));
        // Exactly one delegation; this layer does not retry.
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_backend_is_unavailable() {
        let service = GenerationService::new(gate(false), None, None, None);
        let result = service
            .generate_text(&AccessClaim::default(), text_request(false))
            .await;
        assert!(matches!(result, Err(GatewayError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_generated_text() {
        let backend = Arc::new(MockTextBackend::replying("Hello world"));
        // Nothing listens on port 1, so every put fails.
        let store = Arc::new(
            IpfsClient::new("http://127.0.0.1:1", "https://ipfs.io/ipfs", Duration::from_secs(1))
                .unwrap(),
        );
        let service = GenerationService::new(gate(false), Some(backend), None, Some(store));

        let response = service
            .generate_text(&AccessClaim::default(), text_request(true))
            .await
            .unwrap();

        assert_eq!(response.text, "Hello world");
        assert!(response.content_id.is_none());
        assert!(response.storage_error.is_some());
    }

    #[tokio::test]
    async fn test_storage_success_attaches_content_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/add")
            .with_status(200)
            .with_body(r#"{"Hash":"QmGenerated","Size":"11"}"#)
            .create_async()
            .await;

        let backend = Arc::new(MockTextBackend::replying("Hello world"));
        let store = Arc::new(
            IpfsClient::new(&server.url(), "https://ipfs.io/ipfs", Duration::from_secs(5))
                .unwrap(),
        );
        let service = GenerationService::new(gate(false), Some(backend), None, Some(store));

        let response = service
            .generate_text(&AccessClaim::default(), text_request(true))
            .await
            .unwrap();

        assert_eq!(response.content_id.as_deref(), Some("QmGenerated"));
        assert_eq!(
            response.ipfs_gateway_url.as_deref(),
            Some("https://ipfs.io/ipfs/QmGenerated")
        );
        assert!(response.storage_error.is_none());
    }

    #[tokio::test]
    async fn test_generate_image_stores_decoded_bytes() {
        let mut server = mockito::Server::new_async().await;
        let add_mock = server
            .mock("POST", "/add")
            .match_body(mockito::Matcher::Regex("hello".to_string()))
            .with_status(200)
            .with_body(r#"{"Hash":"QmImage","Size":"5"}"#)
            .create_async()
            .await;

        let backend = Arc::new(MockImageBackend::replying("aGVsbG8="));
        let store = Arc::new(
            IpfsClient::new(&server.url(), "https://ipfs.io/ipfs", Duration::from_secs(5))
                .unwrap(),
        );
        let service = GenerationService::new(gate(false), None, Some(backend.clone()), Some(store));

        let request: ImageGenerationRequest =
            serde_json::from_str(r#"{"prompt": "a red cube", "store_on_ipfs": true}"#).unwrap();
        let response = service
            .generate_image(&AccessClaim::default(), request)
            .await
            .unwrap();

        assert_eq!(response.image_base64, "aGVsbG8=");
        assert_eq!(response.content_id.as_deref(), Some("QmImage"));
        assert_eq!(backend.call_count(), 1);
        add_mock.assert_async().await;
    }
}
