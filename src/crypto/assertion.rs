//! Assertion canonicalization, signing, and verification.
//!
//! The canonical form of an assertion is its serde_json serialization:
//! field order follows struct declaration order in
//! [`LicenseAssertion`], which makes the byte string order-stable across
//! releases. The signature covers exactly those bytes.

use crate::crypto::fingerprint::decode_verifying_key;
use crate::protocol::models::{LicenseAssertion, SignedAssertion};
use crate::{KeyMaterial, LicenseError};
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Verifier};

/// Serialize an assertion to its canonical signing bytes.
pub fn canonical_bytes(assertion: &LicenseAssertion) -> Result<Vec<u8>, LicenseError> {
    serde_json::to_vec(assertion)
        .map_err(|e| LicenseError::ValidationFailed(format!("Canonicalization failed: {}", e)))
}

/// Sign an assertion with the service key material.
///
/// # Errors
/// Returns [`LicenseError::SigningFailure`] if the assertion cannot be
/// canonicalized. A failure here is fatal: the engine never substitutes an
/// unsigned assertion.
pub fn sign_assertion(
    keys: &KeyMaterial,
    assertion: LicenseAssertion,
) -> Result<SignedAssertion, LicenseError> {
    let message = canonical_bytes(&assertion)
        .map_err(|e| LicenseError::SigningFailure(e.to_string()))?;
    let signature = keys.sign(&message);

    Ok(SignedAssertion {
        assertion,
        signature: STANDARD.encode(signature.to_bytes()),
    })
}

/// Verify a signed assertion against a hex-encoded public key.
///
/// Never errors: malformed keys, malformed signatures, and mismatched
/// bytes all yield `false`.
pub fn verify_assertion(signed: &SignedAssertion, public_key_hex: &str) -> bool {
    let Ok(verifying_key) = decode_verifying_key(public_key_hex) else {
        return false;
    };

    let Ok(message) = canonical_bytes(&signed.assertion) else {
        return false;
    };

    let Ok(sig_bytes) = STANDARD.decode(&signed.signature) else {
        return false;
    };

    let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };

    let signature = Signature::from_bytes(&sig_array);
    verifying_key
        .verify(&message, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_keys() -> KeyMaterial {
        // Well-known Ed25519 test vector seed (DO NOT USE IN PRODUCTION).
        KeyMaterial::from_seed_hex(
            "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
        )
        .unwrap()
    }

    fn test_assertion() -> LicenseAssertion {
        LicenseAssertion {
            license_key: "BWRD-US-2026-AAAA-BBBB-CCCC-DDDD".to_string(),
            device_id: "ef".repeat(32),
            kiosk_name: "Gate B12".to_string(),
            location: None,
            activated_at: Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2027, 1, 10, 8, 0, 0).unwrap(),
            last_validated: Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap(),
            grace_expires_at: Utc.with_ymd_and_hms(2026, 2, 15, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let keys = test_keys();
        let signed = sign_assertion(&keys, test_assertion()).unwrap();
        assert!(verify_assertion(&signed, &keys.public_key_hex()));
    }

    #[test]
    fn corrupted_signature_fails_verification() {
        let keys = test_keys();
        let mut signed = sign_assertion(&keys, test_assertion()).unwrap();

        // Flip one byte of the decoded signature.
        let mut raw = STANDARD.decode(&signed.signature).unwrap();
        raw[10] ^= 0x01;
        signed.signature = STANDARD.encode(raw);

        assert!(!verify_assertion(&signed, &keys.public_key_hex()));
    }

    #[test]
    fn corrupted_assertion_fails_verification() {
        let keys = test_keys();
        let mut signed = sign_assertion(&keys, test_assertion()).unwrap();
        signed.assertion.kiosk_name = "Gate B13".to_string();
        assert!(!verify_assertion(&signed, &keys.public_key_hex()));
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let keys = test_keys();
        let other = KeyMaterial::generate().unwrap();
        let signed = sign_assertion(&keys, test_assertion()).unwrap();
        assert!(!verify_assertion(&signed, &other.public_key_hex()));
    }

    #[test]
    fn malformed_inputs_yield_false_not_panic() {
        let keys = test_keys();
        let mut signed = sign_assertion(&keys, test_assertion()).unwrap();

        assert!(!verify_assertion(&signed, "not-hex-at-all"));

        signed.signature = "!!!not base64!!!".to_string();
        assert!(!verify_assertion(&signed, &keys.public_key_hex()));

        signed.signature = STANDARD.encode(b"short");
        assert!(!verify_assertion(&signed, &keys.public_key_hex()));
    }
}
