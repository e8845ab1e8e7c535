use actix_web::HttpRequest;
use alloy::primitives::Address;
use shared::models::instance::Instance;

use crate::error::GatewayError;
use crate::registry::InstanceRegistry;

pub const INSTANCE_ID_HEADER: &str = "x-instance-id";

/// Privileged operations subject to the policy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RegisterInstance,
    GenerateText,
    GenerateImage,
    IpfsAdd,
    IpfsGet,
    DeactivateInstance,
}

/// Per-request caller identity, derived from the `X-Instance-ID` header.
/// Never persisted; recomputed for every request.
#[derive(Debug, Clone, Default)]
pub struct AccessClaim {
    pub instance_id: Option<String>,
    pub instance: Option<Instance>,
}

impl AccessClaim {
    pub async fn from_request(req: &HttpRequest, registry: &InstanceRegistry) -> Self {
        let instance_id = req
            .headers()
            .get(INSTANCE_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let instance = match &instance_id {
            Some(id) => registry.resolve(id).await,
            None => None,
        };

        Self {
            instance_id,
            instance,
        }
    }

    pub fn active_instance(&self) -> Option<&Instance> {
        self.instance.as_ref().filter(|instance| instance.is_active())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    pub require_wallet: bool,
    pub allowed_addresses: Vec<Address>,
}

/// Pure access decision over (capability, claim, config). The registry
/// lookup has already happened when the claim was built; nothing here
/// mutates state.
pub struct PolicyGate {
    config: PolicyConfig,
}

impl PolicyGate {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn authorize(
        &self,
        capability: Capability,
        claim: &AccessClaim,
        target_instance: Option<&str>,
    ) -> Result<(), GatewayError> {
        if capability == Capability::RegisterInstance {
            return Ok(());
        }

        // Instance-scoped regardless of the require_wallet flag: only the
        // instance itself may deactivate. A resolved-but-deactivated caller
        // is accepted so that repeated deactivation stays idempotent.
        if capability == Capability::DeactivateInstance {
            let instance = claim.instance.as_ref().ok_or_else(|| {
                GatewayError::Unauthorized("invalid or missing instance id".to_string())
            })?;
            if target_instance != Some(instance.instance_id.as_str()) {
                return Err(GatewayError::Forbidden(
                    "instances may only deactivate themselves".to_string(),
                ));
            }
            if self.config.require_wallet {
                self.check_allow_list(instance)?;
            }
            return Ok(());
        }

        if !self.config.require_wallet {
            return Ok(());
        }

        let instance = claim.active_instance().ok_or_else(|| {
            GatewayError::Unauthorized("invalid or missing instance id".to_string())
        })?;
        self.check_allow_list(instance)
    }

    fn check_allow_list(&self, instance: &Instance) -> Result<(), GatewayError> {
        if self.config.allowed_addresses.is_empty()
            || self
                .config
                .allowed_addresses
                .contains(&instance.wallet_address)
        {
            Ok(())
        } else {
            Err(GatewayError::Forbidden(
                "wallet address not in allow-list".to_string(),
            ))
        }
    }
}
