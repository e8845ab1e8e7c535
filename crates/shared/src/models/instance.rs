use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A registered compute participant tied to a wallet address.
///
/// Records are never deleted; deactivation flips the status and releases the
/// wallet address for a future registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub instance_id: String,
    #[serde(serialize_with = "serialize_address")]
    pub wallet_address: Address,
    pub status: InstanceStatus,
    pub registered_at: DateTime<Utc>,
    pub last_verified_at: DateTime<Utc>,
}

impl Instance {
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }
}

fn serialize_address<S>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&address.to_string())
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.instance_id, self.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Deactivated,
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Active => write!(f, "active"),
            InstanceStatus::Deactivated => write!(f, "deactivated"),
        }
    }
}

/// Body of `POST /wallet/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
    pub message: String,
    pub signature: String,
}
