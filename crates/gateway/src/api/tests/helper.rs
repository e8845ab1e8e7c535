use crate::api::server::AppState;
use crate::auth::{PolicyConfig, PolicyGate};
use crate::generation::backends::mock::{MockImageBackend, MockTextBackend};
use crate::generation::backends::{ImageBackend, TextBackend};
use crate::generation::GenerationService;
use crate::ipfs::IpfsClient;
use crate::registry::{InstanceRegistry, MemoryRegistry};
use actix_web::web::Data;
use alloy::signers::{local::PrivateKeySigner, Signer};
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct TestContext {
    pub state: Data<AppState>,
    pub text_backend: Arc<MockTextBackend>,
    pub image_backend: Arc<MockImageBackend>,
}

pub(crate) fn create_test_context(require_wallet: bool, ipfs_url: Option<&str>) -> TestContext {
    let registry = Arc::new(InstanceRegistry::new(Arc::new(MemoryRegistry::new())));
    let gate = Arc::new(PolicyGate::new(PolicyConfig {
        require_wallet,
        allowed_addresses: vec![],
    }));
    let ipfs = ipfs_url.map(|url| {
        Arc::new(
            IpfsClient::new(url, "https://ipfs.io/ipfs", Duration::from_secs(5))
                .expect("test ipfs client"),
        )
    });

    let text_backend = Arc::new(MockTextBackend::replying("Hello world"));
    let image_backend = Arc::new(MockImageBackend::replying("aGVsbG8="));

    let generation = Arc::new(GenerationService::new(
        gate.clone(),
        Some(text_backend.clone() as Arc<dyn TextBackend>),
        Some(image_backend.clone() as Arc<dyn ImageBackend>),
        ipfs.clone(),
    ));

    TestContext {
        state: Data::new(AppState {
            registry,
            gate,
            generation,
            ipfs,
            text_backend: Some(text_backend.clone() as Arc<dyn TextBackend>),
            image_backend: Some(image_backend.clone() as Arc<dyn ImageBackend>),
        }),
        text_backend,
        image_backend,
    }
}

/// Registers a fresh random wallet and returns its instance id.
pub(crate) async fn register_test_instance(state: &Data<AppState>) -> String {
    let signer = PrivateKeySigner::random();
    let signature = signer.sign_message(b"login-nonce-1").await.unwrap();

    state
        .registry
        .register(
            &signer.address().to_string(),
            "login-nonce-1",
            &format!("0x{}", hex::encode(signature.as_bytes())),
        )
        .await
        .expect("test registration")
}
