use alloy::primitives::{keccak256, Address};
use alloy::signers::Signature;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Malformed signature, address or unrecoverable message digest.
    #[error("malformed signature or address")]
    InvalidFormat,
    /// Signature recovered cleanly but to a different address.
    #[error("signature does not match claimed address")]
    Mismatch,
}

/// Verifies that `address` signed `message` (EIP-191 personal message).
///
/// Recovers the signer from the signature and compares against the claimed
/// address after normalization. Malformed input yields `InvalidFormat`,
/// never a panic.
pub fn verify_wallet_signature(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<Address, SignatureError> {
    let signature = signature.trim_start_matches("0x");
    let Ok(parsed_signature) = Signature::from_str(signature) else {
        return Err(SignatureError::InvalidFormat);
    };

    let Ok(claimed_address) = Address::from_str(address) else {
        return Err(SignatureError::InvalidFormat);
    };

    let Ok(recovered_address) = parsed_signature.recover_address_from_msg(message) else {
        return Err(SignatureError::InvalidFormat);
    };

    if recovered_address != claimed_address {
        return Err(SignatureError::Mismatch);
    }

    Ok(recovered_address)
}

/// Derives the opaque instance id issued at registration.
///
/// Deterministic over (wallet address, registration message); uniqueness
/// among active instances is enforced by the registry's per-address claim.
pub fn derive_instance_id(address: &Address, message: &str) -> String {
    let digest = keccak256(format!("{address}-{message}").as_bytes());
    format!("0x{}", hex::encode(digest))
}
