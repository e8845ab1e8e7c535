use alloy::primitives::Address;
use async_trait::async_trait;
use redis::AsyncCommands;
use shared::models::instance::Instance;

use super::{RegistryCounts, RegistryStorage, StorageError};

const INSTANCE_KEY_PREFIX: &str = "gateway:instance:";
const ADDRESS_KEY_PREFIX: &str = "gateway:instance-address:";

/// Redis-backed registry. Instances are stored as JSON values; the
/// per-address claim is a `SET NX` key, so concurrent registrations for the
/// same wallet race on a single atomic write.
pub struct RedisRegistry {
    client: redis::Client,
}

impl RedisRegistry {
    pub fn new(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| StorageError(format!("invalid redis url: {err}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| StorageError(format!("redis connection failed: {err}")))
    }

    fn instance_key(instance_id: &str) -> String {
        format!("{INSTANCE_KEY_PREFIX}{instance_id}")
    }

    fn address_key(address: &Address) -> String {
        format!("{ADDRESS_KEY_PREFIX}{address}")
    }
}

#[async_trait]
impl RegistryStorage for RedisRegistry {
    async fn try_claim_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<bool, StorageError> {
        let mut con = self.connection().await?;

        let previous: Option<String> = con
            .set_options(
                Self::address_key(address),
                instance_id,
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .get(true),
            )
            .await
            .map_err(|err| StorageError(format!("address claim failed: {err}")))?;

        Ok(previous.is_none())
    }

    async fn release_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<(), StorageError> {
        let mut con = self.connection().await?;
        let key = Self::address_key(address);

        let holder: Option<String> = con
            .get(&key)
            .await
            .map_err(|err| StorageError(format!("address lookup failed: {err}")))?;

        if holder.as_deref() == Some(instance_id) {
            let _: () = con
                .del(&key)
                .await
                .map_err(|err| StorageError(format!("address release failed: {err}")))?;
        }
        Ok(())
    }

    async fn put_instance(&self, instance: &Instance) -> Result<(), StorageError> {
        let mut con = self.connection().await?;
        let serialized = serde_json::to_string(instance)
            .map_err(|err| StorageError(format!("instance serialization failed: {err}")))?;
        let _: () = con
            .set(Self::instance_key(&instance.instance_id), serialized)
            .await
            .map_err(|err| StorageError(format!("instance write failed: {err}")))?;
        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<Instance>, StorageError> {
        let mut con = self.connection().await?;
        let serialized: Option<String> = con
            .get(Self::instance_key(instance_id))
            .await
            .map_err(|err| StorageError(format!("instance read failed: {err}")))?;

        serialized
            .map(|value| {
                serde_json::from_str(&value)
                    .map_err(|err| StorageError(format!("corrupt instance record: {err}")))
            })
            .transpose()
    }

    async fn counts(&self) -> Result<RegistryCounts, StorageError> {
        let mut con = self.connection().await?;
        let instance_keys: Vec<String> = con
            .keys(format!("{INSTANCE_KEY_PREFIX}*"))
            .await
            .map_err(|err| StorageError(format!("instance scan failed: {err}")))?;
        let address_keys: Vec<String> = con
            .keys(format!("{ADDRESS_KEY_PREFIX}*"))
            .await
            .map_err(|err| StorageError(format!("address scan failed: {err}")))?;

        Ok(RegistryCounts {
            total: instance_keys.len(),
            active: address_keys.len(),
        })
    }
}
