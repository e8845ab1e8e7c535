mod api;
mod auth;
mod config;
mod error;
mod generation;
mod ipfs;
mod registry;

pub use api::server::start_server;
pub use api::server::AppState;
pub use auth::{AccessClaim, Capability, PolicyConfig, PolicyGate, INSTANCE_ID_HEADER};
pub use config::{BackendConfig, GatewayConfig, IpfsConfig};
pub use error::GatewayError;
pub use generation::backends::{
    BackendError, HttpImageBackend, HttpTextBackend, ImageBackend, PeerInfo, TextBackend,
};
pub use generation::GenerationService;
pub use ipfs::{IpfsClient, StoreError};
pub use registry::{
    InstanceRegistry, MemoryRegistry, RedisRegistry, RegistryCounts, RegistryStorage, StorageError,
};
