//! One-way device fingerprinting.
//!
//! A fingerprint is the system's only representation of "which device".
//! Raw device identifiers are hashed at the boundary and never persisted;
//! no inverse operation exists anywhere in the crate.

use crate::LicenseError;
use ed25519_dalek::VerifyingKey;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

/// Compute the SHA-256 fingerprint of a raw device identifier.
///
/// Deterministic: the same raw id always produces the same fingerprint,
/// which is what lets repeat activation and validation calls match the
/// stored binding.
pub fn hash_device_id(raw_device_id: &str) -> String {
    let hash = Sha256::digest(raw_device_id.as_bytes());
    hex::encode(hash)
}

/// Cache for decoded verifying keys.
static KEY_CACHE: OnceCell<RwLock<HashMap<String, VerifyingKey>>> = OnceCell::new();

/// Decode a hex-encoded Ed25519 public key.
///
/// The key is cached after first decode for performance.
pub fn decode_verifying_key(hex_key: &str) -> Result<VerifyingKey, LicenseError> {
    let cache = KEY_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    if let Ok(guard) = cache.read() {
        if let Some(key) = guard.get(hex_key) {
            return Ok(*key);
        }
    }

    let bytes = hex::decode(hex_key)
        .map_err(|e| LicenseError::ConfigError(format!("Invalid public key hex: {}", e)))?;

    let key_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| LicenseError::ConfigError("Public key must be 32 bytes".to_string()))?;

    let verifying_key = VerifyingKey::from_bytes(&key_array)
        .map_err(|e| LicenseError::ConfigError(format!("Invalid Ed25519 public key: {}", e)))?;

    // Best-effort insert. If locking fails, still return the decoded key.
    if let Ok(mut guard) = cache.write() {
        guard.insert(hex_key.to_string(), verifying_key);
    }

    Ok(verifying_key)
}
