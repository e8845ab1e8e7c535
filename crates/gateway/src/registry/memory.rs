use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::models::instance::Instance;

use super::{RegistryCounts, RegistryStorage, StorageError};

/// In-memory registry backing. The address index's `entry` API gives the
/// per-key atomicity the one-active-instance-per-address invariant needs.
#[derive(Default)]
pub struct MemoryRegistry {
    instances: DashMap<String, Instance>,
    active_by_address: DashMap<Address, String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStorage for MemoryRegistry {
    async fn try_claim_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<bool, StorageError> {
        match self.active_by_address.entry(*address) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(instance_id.to_string());
                Ok(true)
            }
        }
    }

    async fn release_address(
        &self,
        address: &Address,
        instance_id: &str,
    ) -> Result<(), StorageError> {
        self.active_by_address
            .remove_if(address, |_, holder| holder == instance_id);
        Ok(())
    }

    async fn put_instance(&self, instance: &Instance) -> Result<(), StorageError> {
        self.instances
            .insert(instance.instance_id.clone(), instance.clone());
        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<Instance>, StorageError> {
        Ok(self
            .instances
            .get(instance_id)
            .map(|entry| entry.value().clone()))
    }

    async fn counts(&self) -> Result<RegistryCounts, StorageError> {
        Ok(RegistryCounts {
            total: self.instances.len(),
            active: self.active_by_address.len(),
        })
    }
}
