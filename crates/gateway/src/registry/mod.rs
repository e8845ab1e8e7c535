mod memory;
mod redis;

pub use memory::MemoryRegistry;
pub use redis::RedisRegistry;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use shared::models::instance::{Instance, InstanceStatus};
use shared::security::signature::{derive_instance_id, verify_wallet_signature, SignatureError};
use std::sync::Arc;

use crate::error::GatewayError;

/// Failure of the registry's durability layer. Surfaces as a degraded
/// service state; callers never receive stale data instead.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RegistryCounts {
    pub total: usize,
    pub active: usize,
}

/// Persistence backing for the instance registry, swappable between the
/// in-memory and Redis implementations.
#[async_trait]
pub trait RegistryStorage: Send + Sync {
    /// Atomically claims `address` for `instance_id`. Returns false when an
    /// active instance already holds the address. Two concurrent claims for
    /// the same address must not both succeed.
    async fn try_claim_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<bool, StorageError>;

    /// Releases the address claim held by `instance_id`, if any.
    async fn release_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<(), StorageError>;

    async fn put_instance(&self, instance: &Instance) -> Result<(), StorageError>;

    async fn get_instance(&self, instance_id: &str) -> Result<Option<Instance>, StorageError>;

    async fn counts(&self) -> Result<RegistryCounts, StorageError>;
}

/// Durable mapping of instance identity to wallet address and status.
///
/// Registration is gated on signature verification; at most one active
/// instance exists per wallet address. Re-registration while an instance is
/// active is rejected — deactivate first.
pub struct InstanceRegistry {
    storage: Arc<dyn RegistryStorage>,
}

impl InstanceRegistry {
    pub fn new(storage: Arc<dyn RegistryStorage>) -> Self {
        Self { storage }
    }

    pub async fn register(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> Result<String, GatewayError> {
        let wallet_address =
            verify_wallet_signature(address, message, signature).map_err(|err| match err {
                SignatureError::InvalidFormat => {
                    GatewayError::InvalidFormat("malformed address or signature".to_string())
                }
                SignatureError::Mismatch => {
                    GatewayError::Unauthorized("signature does not match address".to_string())
                }
            })?;

        let instance_id = derive_instance_id(&wallet_address, message);

        if !self
            .storage
            .try_claim_address(&wallet_address, &instance_id)
            .await?
        {
            return Err(GatewayError::AlreadyRegistered);
        }

        let now = Utc::now();
        let instance = Instance {
            instance_id: instance_id.clone(),
            wallet_address,
            status: InstanceStatus::Active,
            registered_at: now,
            last_verified_at: now,
        };

        if let Err(err) = self.storage.put_instance(&instance).await {
            // Free the address so a failed write does not wedge the wallet.
            if let Err(release_err) = self
                .storage
                .release_address(&wallet_address, &instance_id)
                .await
            {
                warn!("failed to release address after write failure: {release_err}");
            }
            return Err(err.into());
        }

        info!("registered instance {instance_id} for wallet {wallet_address}");
        Ok(instance_id)
    }

    pub async fn verify(&self, instance_id: &str) -> Result<InstanceStatus, GatewayError> {
        let mut instance = self
            .storage
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("unknown instance {instance_id}")))?;

        if instance.is_active() {
            instance.last_verified_at = Utc::now();
            self.storage.put_instance(&instance).await?;
        }

        Ok(instance.status)
    }

    /// Idempotent: deactivating an already-deactivated instance succeeds.
    pub async fn deactivate(&self, instance_id: &str) -> Result<(), GatewayError> {
        let mut instance = self
            .storage
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("unknown instance {instance_id}")))?;

        if !instance.is_active() {
            return Ok(());
        }

        instance.status = InstanceStatus::Deactivated;
        self.storage.put_instance(&instance).await?;
        self.storage
            .release_address(&instance.wallet_address, instance_id)
            .await?;

        info!(
            "deactivated instance {instance_id} for wallet {}",
            instance.wallet_address
        );
        Ok(())
    }

    /// Lookup for the policy gate: never fails, a storage error is logged
    /// and reported as absence.
    pub async fn resolve(&self, instance_id: &str) -> Option<Instance> {
        match self.storage.get_instance(instance_id).await {
            Ok(instance) => instance,
            Err(err) => {
                warn!("registry lookup for {instance_id} failed: {err}");
                None
            }
        }
    }

    pub async fn counts(&self) -> Result<RegistryCounts, GatewayError> {
        Ok(self.storage.counts().await?)
    }
}
