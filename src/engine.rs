//! Lifecycle engine - the main public API for Boothwarden.
//!
//! The `LifecycleEngine` drives the license state machine:
//! - Operator-triggered issue, revoke, delete
//! - Device-triggered activate (idempotent for the bound device) and
//!   periodic validate
//! - Device-locked offline bundle generation
//!
//! Every activate/validate attempt produces exactly one audit entry,
//! success or failure. Audit writes are best-effort: a failed append is
//! logged operationally and never rolls back a committed transition.

use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::crypto::assertion::sign_assertion;
use crate::crypto::fingerprint::hash_device_id;
use crate::crypto::keys::KeyMaterial;
use crate::crypto::offline::encode_bundle;
use crate::keygen::generate_key;
use crate::protocol::models::{
    AttemptKind, License, LicenseAssertion, LicenseStatus, OfflineBundle, SignedAssertion,
    ValidationLogEntry, ValidationOutcome,
};
use crate::store::LicenseStore;
use crate::LicenseError;
use chrono::Duration;
use std::sync::Arc;

/// How many times key generation retries on a store collision before
/// surfacing an error. With 31^16 random combinations per year this is
/// unreachable in practice; the contract just never silently reuses a key.
const MAX_KEY_ATTEMPTS: usize = 8;

/// Operator request to issue a new license.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Kiosk display name (required, descriptive only).
    pub kiosk_name: String,

    /// Deployment location (descriptive only).
    pub location: Option<String>,

    /// ISO country code baked into the generated key.
    pub country_code: String,

    /// Validity in days; the configured default applies when omitted.
    pub validity_days: Option<u32>,
}

/// Main lifecycle engine.
///
/// Create one instance at boot and share it across request handlers; it
/// holds no mutable license state, so correctness rests on the store's
/// transactional guarantees.
pub struct LifecycleEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    keys: KeyMaterial,
    store: Arc<dyn LicenseStore>,
    audit: Arc<dyn AuditLog>,
}

impl LifecycleEngine {
    /// Create a new engine with the given configuration and collaborators.
    ///
    /// Uses the system clock for time operations.
    pub fn new(
        config: EngineConfig,
        keys: KeyMaterial,
        store: Arc<dyn LicenseStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        Ok(Self::with_clock(config, keys, store, audit, Arc::new(SystemClock)))
    }

    /// Create an engine with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: EngineConfig,
        keys: KeyMaterial,
        store: Arc<dyn LicenseStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        Ok(Self::with_clock(config, keys, store, audit, clock))
    }

    fn with_clock(
        config: EngineConfig,
        keys: KeyMaterial,
        store: Arc<dyn LicenseStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            keys,
            store,
            audit,
        }
    }

    /// Issue a new `pending` license.
    ///
    /// Generates a collision-checked key and persists the record with
    /// `issued_at = now` and `expires_at = now + validity`.
    pub fn issue(&self, request: IssueRequest) -> Result<License, LicenseError> {
        if request.kiosk_name.trim().is_empty() {
            return Err(LicenseError::InvalidRequest(
                "kiosk_name cannot be empty".to_string(),
            ));
        }
        if request.country_code.is_empty()
            || !request.country_code.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(LicenseError::InvalidRequest(format!(
                "country_code must be alphabetic, got {:?}",
                request.country_code
            )));
        }
        let validity_days = match request.validity_days {
            Some(0) => {
                return Err(LicenseError::InvalidRequest(
                    "validity_days must be at least 1".to_string(),
                ))
            }
            Some(days) => days,
            None => self.config.default_validity_days,
        };

        let now = self.clock.now_utc();
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = generate_key(
                &self.config.key_prefix,
                &request.country_code,
                self.clock.as_ref(),
            )?;

            // Never silently reuse a key: regenerate on collision.
            if self.store.get_by_key(&key)?.is_some() {
                continue;
            }

            let license = License {
                key: key.clone(),
                device_fingerprint: None,
                status: LicenseStatus::Pending,
                issued_at: now,
                expires_at: now + Duration::days(i64::from(validity_days)),
                activated_at: None,
                last_validated_at: None,
                revoked_at: None,
                revoke_reason: None,
                kiosk_name: request.kiosk_name.clone(),
                location: request.location.clone(),
                country_code: request.country_code.to_ascii_uppercase(),
            };
            self.store.create_pending(license.clone())?;

            tracing::debug!(key = %key, "issued pending license");
            return Ok(license);
        }

        Err(LicenseError::Store(
            "license key space collision retries exhausted".to_string(),
        ))
    }

    /// Activate a license for a device.
    ///
    /// Idempotent for the bound device: the same device re-activating
    /// (e.g., after a reinstall) receives a freshly signed assertion.
    /// A second device can never overwrite an existing binding.
    pub fn activate(
        &self,
        key: &str,
        raw_device_id: &str,
    ) -> Result<SignedAssertion, LicenseError> {
        self.activate_with_caller(key, raw_device_id, None)
    }

    /// [`activate`](Self::activate) with caller metadata for the audit trail.
    pub fn activate_with_caller(
        &self,
        key: &str,
        raw_device_id: &str,
        caller: Option<&str>,
    ) -> Result<SignedAssertion, LicenseError> {
        let fingerprint = hash_device_id(raw_device_id);
        let result = self.activate_inner(key, &fingerprint);
        self.record_attempt(key, &fingerprint, AttemptKind::Activation, caller, &result);
        result
    }

    fn activate_inner(
        &self,
        key: &str,
        fingerprint: &str,
    ) -> Result<SignedAssertion, LicenseError> {
        let license = self.fetch_live(key)?;
        let now = self.clock.now_utc();

        match license.status {
            LicenseStatus::Active => self.reactivate(&license, fingerprint),
            LicenseStatus::Pending => {
                match self
                    .store
                    .transition_pending_to_active(key, fingerprint, now)?
                {
                    Some(updated) => {
                        tracing::debug!(key = %key, "license activated");
                        self.sign_current(&updated)
                    }
                    None => {
                        // Lost the race (or the record just changed).
                        // Re-read and evaluate against the state that won.
                        let current = self.fetch_live(key)?;
                        match current.status {
                            LicenseStatus::Active => self.reactivate(&current, fingerprint),
                            _ => Err(LicenseError::DeviceMismatch),
                        }
                    }
                }
            }
            // fetch_live already rejected revoked records.
            LicenseStatus::Revoked => Err(LicenseError::Revoked {
                reason: license.revoke_reason.unwrap_or_default(),
            }),
        }
    }

    /// Idempotent-reactivate branch: the stored binding decides.
    fn reactivate(
        &self,
        license: &License,
        fingerprint: &str,
    ) -> Result<SignedAssertion, LicenseError> {
        if license.device_fingerprint.as_deref() == Some(fingerprint) {
            self.sign_current(license)
        } else {
            Err(LicenseError::DeviceMismatch)
        }
    }

    /// Periodic heartbeat validation.
    ///
    /// The only state change is advancing `last_validated_at`; status and
    /// fingerprint are untouched. A license that was never activated
    /// fails with `DeviceMismatch`.
    pub fn validate(
        &self,
        key: &str,
        raw_device_id: &str,
    ) -> Result<ValidationOutcome, LicenseError> {
        self.validate_with_caller(key, raw_device_id, None)
    }

    /// [`validate`](Self::validate) with caller metadata for the audit trail.
    pub fn validate_with_caller(
        &self,
        key: &str,
        raw_device_id: &str,
        caller: Option<&str>,
    ) -> Result<ValidationOutcome, LicenseError> {
        let fingerprint = hash_device_id(raw_device_id);
        let result = self.validate_inner(key, &fingerprint);
        self.record_attempt(key, &fingerprint, AttemptKind::Periodic, caller, &result);
        result
    }

    fn validate_inner(
        &self,
        key: &str,
        fingerprint: &str,
    ) -> Result<ValidationOutcome, LicenseError> {
        let license = self.fetch_live(key)?;

        // A null stored fingerprint (never activated) merges into the
        // mismatch case: validate before activate must fail.
        if license.device_fingerprint.as_deref() != Some(fingerprint) {
            return Err(LicenseError::DeviceMismatch);
        }

        let now = self.clock.now_utc();
        self.store.touch_validation(key, now)?;

        Ok(ValidationOutcome {
            expires_at: license.expires_at,
            last_validated: now,
            grace_expires_at: now + self.grace_duration(),
        })
    }

    /// Revoke a license. Terminal; valid from `pending` or `active`.
    ///
    /// Revoking an already-revoked license is a no-op returning the
    /// record with its original reason.
    pub fn revoke(&self, key: &str, reason: &str) -> Result<License, LicenseError> {
        if reason.trim().is_empty() {
            return Err(LicenseError::InvalidRequest(
                "revoke reason cannot be empty".to_string(),
            ));
        }

        let now = self.clock.now_utc();
        let license = self
            .store
            .revoke(key, reason.trim(), now)?
            .ok_or(LicenseError::NotFound)?;

        tracing::debug!(key = %key, reason = %reason, "license revoked");
        Ok(license)
    }

    /// Permanently delete a license record.
    ///
    /// A destructive administrative action outside the trust state
    /// machine; no lifecycle implications follow.
    pub fn delete(&self, key: &str) -> Result<(), LicenseError> {
        if self.store.delete(key)? {
            tracing::debug!(key = %key, "license deleted");
            Ok(())
        } else {
            Err(LicenseError::NotFound)
        }
    }

    /// Build a device-locked offline bundle for an active license.
    ///
    /// Requires the requesting device to match the stored binding; the
    /// bundle's symmetric key is derived from the raw device id and is
    /// never stored server-side.
    pub fn generate_offline_bundle(
        &self,
        key: &str,
        raw_device_id: &str,
    ) -> Result<OfflineBundle, LicenseError> {
        let fingerprint = hash_device_id(raw_device_id);
        let license = self.fetch_live(key)?;

        if license.status != LicenseStatus::Active
            || license.device_fingerprint.as_deref() != Some(fingerprint.as_str())
        {
            return Err(LicenseError::DeviceMismatch);
        }

        let signed = self.sign_current(&license)?;
        encode_bundle(signed, raw_device_id)
    }

    /// Hex-encoded public verification key.
    pub fn public_key_hex(&self) -> String {
        self.keys.public_key_hex()
    }

    /// PEM-encoded public verification key — the only cryptographic
    /// material that ever crosses the service boundary.
    pub fn public_key_pem(&self) -> Result<String, LicenseError> {
        self.keys.public_key_pem()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch a license and apply the shared failure ladder:
    /// `NotFound` → `Revoked` → `Expired`.
    fn fetch_live(&self, key: &str) -> Result<License, LicenseError> {
        let license = self.store.get_by_key(key)?.ok_or(LicenseError::NotFound)?;

        if license.status == LicenseStatus::Revoked {
            return Err(LicenseError::Revoked {
                reason: license.revoke_reason.clone().unwrap_or_default(),
            });
        }
        if license.is_expired(self.clock.now_utc()) {
            return Err(LicenseError::Expired);
        }
        Ok(license)
    }

    /// Sign an assertion reflecting the license's current state.
    fn sign_current(&self, license: &License) -> Result<SignedAssertion, LicenseError> {
        let device_id = license
            .device_fingerprint
            .clone()
            .ok_or_else(|| missing_field(license, "device_fingerprint"))?;
        let activated_at = license
            .activated_at
            .ok_or_else(|| missing_field(license, "activated_at"))?;
        let last_validated = license
            .last_validated_at
            .ok_or_else(|| missing_field(license, "last_validated_at"))?;

        sign_assertion(
            &self.keys,
            LicenseAssertion {
                license_key: license.key.clone(),
                device_id,
                kiosk_name: license.kiosk_name.clone(),
                location: license.location.clone(),
                activated_at,
                expires_at: license.expires_at,
                last_validated,
                grace_expires_at: last_validated + self.grace_duration(),
            },
        )
    }

    fn grace_duration(&self) -> Duration {
        Duration::seconds(self.config.grace_period.as_secs() as i64)
    }

    /// Write exactly one audit entry for a device-triggered attempt.
    /// Best-effort: a logging failure never aborts a committed result,
    /// but it is surfaced on the operational channel.
    fn record_attempt<T>(
        &self,
        key: &str,
        fingerprint: &str,
        kind: AttemptKind,
        caller: Option<&str>,
        result: &Result<T, LicenseError>,
    ) {
        let entry = ValidationLogEntry {
            license_key: key.to_string(),
            device_fingerprint: fingerprint.to_string(),
            kind,
            success: result.is_ok(),
            failure_reason: result.as_ref().err().map(|e| e.to_string()),
            caller: caller.map(str::to_string),
            timestamp: self.clock.now_utc(),
        };

        if let Err(err) = self.audit.append(&entry) {
            tracing::warn!(key = %key, error = %err, "audit append failed");
        }
    }
}

fn missing_field(license: &License, field: &str) -> LicenseError {
    LicenseError::ValidationFailed(format!(
        "active license {} missing {}",
        license.key, field
    ))
}
