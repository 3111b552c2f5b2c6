//! Boothwarden error types.
//!
//! Domain errors (`NotFound`, `Revoked`, `Expired`, `DeviceMismatch`) are
//! deterministic functions of current state plus input. Infrastructure
//! failures (`Store`, `AuditIo`, `KeyMaterial`) are kept as distinct
//! variants so a device can never mistake a transient backend failure for
//! a revocation.

use thiserror::Error;

/// Errors that can occur during license lifecycle operations.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No license exists for the given key.
    #[error("License not found")]
    NotFound,

    /// License has been revoked by an operator.
    #[error("License revoked: {reason}")]
    Revoked {
        /// The operator-supplied reason recorded at revocation time.
        reason: String,
    },

    /// License validity window has passed.
    #[error("License expired")]
    Expired,

    /// Request fingerprint does not match the bound device
    /// (or the license was never activated).
    #[error("Device fingerprint mismatch")]
    DeviceMismatch,

    /// A request was malformed (empty key, empty revoke reason, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Assertion canonicalization or offline encoding failed.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Producing a signature failed. Fatal: an unsigned assertion must
    /// never be returned as if valid.
    #[error("Signing failure: {0}")]
    SigningFailure(String),

    /// Signing key material could not be generated, loaded, or persisted.
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    /// Store-layer failure (connection loss, transaction conflict).
    /// Retryable at the caller's discretion; never a trust decision.
    #[error("Store error: {0}")]
    Store(String),

    /// Audit log I/O failure. Best-effort observability only.
    #[error("Audit log I/O error: {0}")]
    AuditIo(String),
}
