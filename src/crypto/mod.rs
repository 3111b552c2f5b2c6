//! Cryptographic primitives: key material, fingerprints, assertion
//! signing, and device-locked offline encoding.

pub mod assertion;
pub mod fingerprint;
pub mod keys;
pub mod offline;
