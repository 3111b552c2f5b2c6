//! License records and wire-stable response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted license status.
///
/// Transitions are monotone: `pending → active → revoked`; `revoked` is
/// terminal. "Expired" is deliberately *not* a member: it is derived at
/// read time from `expires_at` (see [`License::is_expired`]) so no
/// background sweep exists to go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Issued but not yet bound to a device.
    Pending,
    /// Bound to exactly one device fingerprint.
    Active,
    /// Terminally revoked by an operator.
    Revoked,
}

/// Durable license record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// Globally unique, human-readable key
    /// (`PREFIX-COUNTRY-YEAR-XXXX-XXXX-XXXX-XXXX`).
    pub key: String,

    /// One-way hash of the bound device id. Set exactly once, at first
    /// successful activation; never changes for the life of the license.
    pub device_fingerprint: Option<String>,

    /// Persisted status.
    pub status: LicenseStatus,

    /// Issue time; immutable once set.
    pub issued_at: DateTime<Utc>,

    /// Expiry time; immutable once set.
    pub expires_at: DateTime<Utc>,

    /// Set by the winning activation.
    pub activated_at: Option<DateTime<Utc>>,

    /// Advanced by each successful validation; never moves backward.
    pub last_validated_at: Option<DateTime<Utc>>,

    /// Set once by revocation; irreversible.
    pub revoked_at: Option<DateTime<Utc>>,

    /// Operator-supplied revocation reason; never overwritten.
    pub revoke_reason: Option<String>,

    /// Kiosk display name. Descriptive only, not part of the trust decision.
    pub kiosk_name: String,

    /// Deployment location. Descriptive only.
    pub location: Option<String>,

    /// ISO country code baked into the key. Descriptive only.
    pub country_code: String,
}

impl License {
    /// Whether the validity window has passed. Pure function of
    /// `(expires_at, now)`; the result is never persisted.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Canonical set of license facts that gets signed.
///
/// Serialization is order-stable (struct declaration order) and camelCase;
/// the signature covers exactly these bytes, so field order here is
/// wire-frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssertion {
    /// The license key.
    pub license_key: String,

    /// The bound device fingerprint (hash, never the raw id).
    pub device_id: String,

    /// Kiosk display name.
    pub kiosk_name: String,

    /// Deployment location, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// When the license was activated.
    pub activated_at: DateTime<Utc>,

    /// When the license expires.
    pub expires_at: DateTime<Utc>,

    /// Last successful validation.
    pub last_validated: DateTime<Utc>,

    /// End of the offline grace window (`last_validated + grace_period`).
    pub grace_expires_at: DateTime<Utc>,
}

/// A license assertion together with its Ed25519 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAssertion {
    /// The signed facts.
    #[serde(flatten)]
    pub assertion: LicenseAssertion,

    /// Base64-encoded Ed25519 signature over the canonical assertion bytes.
    pub signature: String,
}

/// Authenticated-encrypted package allowing a specific device to hold
/// proof of license validity without further server contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineBundle {
    /// Hex-encoded AES-256-GCM ciphertext (tag stripped).
    pub encrypted: String,

    /// Hex-encoded 96-bit nonce.
    pub iv: String,

    /// Hex-encoded 128-bit GCM authentication tag.
    pub auth_tag: String,

    /// Plaintext copy of the signed assertion for operator visibility.
    pub license_data: SignedAssertion,
}

/// Expiry/validity window returned by a successful periodic validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    /// When the license expires.
    pub expires_at: DateTime<Utc>,

    /// The validation timestamp just recorded.
    pub last_validated: DateTime<Utc>,

    /// End of the offline grace window.
    pub grace_expires_at: DateTime<Utc>,
}

/// Kind of device-triggered attempt being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptKind {
    /// First-contact or repeat activation.
    Activation,
    /// Periodic heartbeat validation.
    Periodic,
}

/// Append-only audit record of one activation/validation attempt.
///
/// Observational only: entries are never read back to make trust
/// decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationLogEntry {
    /// License key the attempt targeted.
    pub license_key: String,

    /// Fingerprint presented by the caller.
    pub device_fingerprint: String,

    /// Activation or periodic validation.
    pub kind: AttemptKind,

    /// Whether the attempt succeeded.
    pub success: bool,

    /// Failure reason for unsuccessful attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Free-form caller metadata (source address, agent string, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,

    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
}
