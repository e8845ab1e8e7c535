mod policy;

pub use policy::{AccessClaim, Capability, PolicyConfig, PolicyGate, INSTANCE_ID_HEADER};
