//! Device-locked offline bundle encoding.
//!
//! The bundle key is derived from the *raw* device id with
//! PBKDF2-HMAC-SHA256 (fixed service-wide salt, fixed iteration count),
//! so the bundle is cryptographically tied to one device without the
//! server ever storing the symmetric key. Encryption is AES-256-GCM;
//! the GCM tag must authenticate before any plaintext is trusted.
//!
//! The server never decodes bundles it creates. [`decode_bundle`] is the
//! bit-compatible counterpart used by device-side tooling and tests.

use crate::protocol::models::{OfflineBundle, SignedAssertion};
use crate::LicenseError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use ring::pbkdf2;
use std::num::NonZeroU32;
use zeroize::Zeroize;

/// Service-wide PBKDF2 salt. Wire-frozen: changing it orphans every
/// bundle already in the field.
const BUNDLE_SALT: &[u8] = b"boothwarden/offline-bundle/v1";

/// Fixed PBKDF2 iteration count. Known in advance, so key derivation is
/// bounded CPU work that can run synchronously within a request.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

fn derive_bundle_key(raw_device_id: &str) -> Result<[u8; 32], LicenseError> {
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| LicenseError::ValidationFailed("Iteration count is zero".to_string()))?;

    let mut key = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        BUNDLE_SALT,
        raw_device_id.as_bytes(),
        &mut key,
    );
    Ok(key)
}

/// Encrypt a signed assertion into an offline bundle for one device.
///
/// The plaintext signed assertion rides along in `license_data` for
/// operator visibility; the trust artifact is the ciphertext.
pub fn encode_bundle(
    signed: SignedAssertion,
    raw_device_id: &str,
) -> Result<OfflineBundle, LicenseError> {
    let plaintext = serde_json::to_vec(&signed)
        .map_err(|e| LicenseError::ValidationFailed(format!("Bundle serialization: {}", e)))?;

    let mut key = derive_bundle_key(raw_device_id)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|_| LicenseError::ValidationFailed("Invalid AES-256 key length".to_string()));
    key.zeroize();
    let cipher = cipher?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| LicenseError::ValidationFailed(format!("RNG failure: {}", e)))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm emits ciphertext||tag; the wire shape carries them separately.
    let sealed = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|_| LicenseError::ValidationFailed("Bundle encryption failed".to_string()))?;
    let split = sealed.len() - TAG_LEN;

    Ok(OfflineBundle {
        encrypted: hex::encode(&sealed[..split]),
        iv: hex::encode(nonce_bytes),
        auth_tag: hex::encode(&sealed[split..]),
        license_data: signed,
    })
}

/// Decrypt and authenticate an offline bundle with a raw device id.
///
/// Fails with [`LicenseError::DeviceMismatch`] when the derived key does
/// not authenticate the ciphertext — i.e. the bundle was encoded for a
/// different device or has been tampered with.
pub fn decode_bundle(
    bundle: &OfflineBundle,
    raw_device_id: &str,
) -> Result<SignedAssertion, LicenseError> {
    let ciphertext = hex::decode(&bundle.encrypted)
        .map_err(|e| LicenseError::ValidationFailed(format!("Invalid ciphertext hex: {}", e)))?;
    let iv = hex::decode(&bundle.iv)
        .map_err(|e| LicenseError::ValidationFailed(format!("Invalid iv hex: {}", e)))?;
    let tag = hex::decode(&bundle.auth_tag)
        .map_err(|e| LicenseError::ValidationFailed(format!("Invalid tag hex: {}", e)))?;

    if iv.len() != NONCE_LEN {
        return Err(LicenseError::ValidationFailed(format!(
            "Nonce must be {} bytes, got {}",
            NONCE_LEN,
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(LicenseError::ValidationFailed(format!(
            "Auth tag must be {} bytes, got {}",
            TAG_LEN,
            tag.len()
        )));
    }

    let mut key = derive_bundle_key(raw_device_id)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|_| LicenseError::ValidationFailed("Invalid AES-256 key length".to_string()));
    key.zeroize();
    let cipher = cipher?;

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
        .map_err(|_| LicenseError::DeviceMismatch)?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| LicenseError::ValidationFailed(format!("Bundle payload parse: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::assertion::sign_assertion;
    use crate::protocol::models::LicenseAssertion;
    use crate::KeyMaterial;
    use chrono::{TimeZone, Utc};

    fn signed_fixture() -> SignedAssertion {
        let keys = KeyMaterial::from_seed_hex(
            "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
        )
        .unwrap();
        sign_assertion(
            &keys,
            LicenseAssertion {
                license_key: "BWRD-DE-2026-QQQQ-WWWW-EEEE-RRRR".to_string(),
                device_id: "ab".repeat(32),
                kiosk_name: "Platform 9".to_string(),
                location: Some("BER".to_string()),
                activated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
                expires_at: Utc.with_ymd_and_hms(2027, 3, 1, 12, 0, 0).unwrap(),
                last_validated: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
                grace_expires_at: Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap(),
            },
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_recovers_exact_assertion_and_signature() {
        let signed = signed_fixture();
        let bundle = encode_bundle(signed.clone(), "dev-A").unwrap();
        let decoded = decode_bundle(&bundle, "dev-A").unwrap();

        assert_eq!(decoded.assertion, signed.assertion);
        assert_eq!(decoded.signature, signed.signature);
    }

    #[test]
    fn wrong_device_id_fails_authentication() {
        let bundle = encode_bundle(signed_fixture(), "dev-A").unwrap();
        let result = decode_bundle(&bundle, "dev-B");
        assert!(matches!(result, Err(LicenseError::DeviceMismatch)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let mut bundle = encode_bundle(signed_fixture(), "dev-A").unwrap();
        let mut raw = hex::decode(&bundle.encrypted).unwrap();
        raw[0] ^= 0x01;
        bundle.encrypted = hex::encode(raw);

        let result = decode_bundle(&bundle, "dev-A");
        assert!(matches!(result, Err(LicenseError::DeviceMismatch)));
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let mut bundle = encode_bundle(signed_fixture(), "dev-A").unwrap();
        let mut raw = hex::decode(&bundle.auth_tag).unwrap();
        raw[15] ^= 0x80;
        bundle.auth_tag = hex::encode(raw);

        let result = decode_bundle(&bundle, "dev-A");
        assert!(matches!(result, Err(LicenseError::DeviceMismatch)));
    }

    #[test]
    fn bundle_wire_fields_are_hex() {
        let bundle = encode_bundle(signed_fixture(), "dev-A").unwrap();
        assert!(hex::decode(&bundle.encrypted).is_ok());
        assert_eq!(hex::decode(&bundle.iv).unwrap().len(), NONCE_LEN);
        assert_eq!(hex::decode(&bundle.auth_tag).unwrap().len(), TAG_LEN);
    }

    #[test]
    fn nonces_are_unique_per_encoding() {
        let signed = signed_fixture();
        let a = encode_bundle(signed.clone(), "dev-A").unwrap();
        let b = encode_bundle(signed, "dev-A").unwrap();
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn malformed_hex_is_a_validation_error() {
        let mut bundle = encode_bundle(signed_fixture(), "dev-A").unwrap();
        bundle.iv = "zz".to_string();
        let result = decode_bundle(&bundle, "dev-A");
        assert!(matches!(result, Err(LicenseError::ValidationFailed(_))));
    }
}
