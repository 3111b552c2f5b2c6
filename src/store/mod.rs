//! Durable license storage contract.
//!
//! The store is the single shared mutable resource in the system; request
//! handlers keep no in-process license state, so correctness rests
//! entirely on the conditional, atomic transitions defined here. Any
//! backend (relational, key-value) can implement the trait as long as
//! [`LicenseStore::transition_pending_to_active`] is atomic with respect
//! to concurrent callers — the moral equivalent of
//! `UPDATE ... WHERE status = 'pending'` with an affected-row check.

pub mod memory;

use crate::protocol::models::License;
use crate::LicenseError;
use chrono::{DateTime, Utc};

/// Durable record of license state with atomic conditional transitions.
///
/// Implementations report backend failures as [`LicenseError::Store`];
/// they never translate them into domain errors.
pub trait LicenseStore: Send + Sync {
    /// Persist a freshly issued `pending` license.
    ///
    /// Fails with [`LicenseError::Store`] if the key already exists —
    /// the engine collision-checks first, so a hit here means a race
    /// with another issuer, and the key must be regenerated either way.
    fn create_pending(&self, license: License) -> Result<(), LicenseError>;

    /// Fetch a license by key.
    fn get_by_key(&self, key: &str) -> Result<Option<License>, LicenseError>;

    /// Fetch the *active* license bound to a fingerprint, if any.
    fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<License>, LicenseError>;

    /// Atomically transition `pending → active`, binding the fingerprint
    /// and setting `activated_at = last_validated_at = now`.
    ///
    /// Returns `Some(updated)` iff this caller observed the pending state
    /// and won the transition; `None` when the record is absent or no
    /// longer pending, in which case the caller re-reads and evaluates
    /// the already-active branch against whatever fingerprint won.
    fn transition_pending_to_active(
        &self,
        key: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<License>, LicenseError>;

    /// Advance `last_validated_at` to `now`.
    ///
    /// A write older than the stored value is ignored, so out-of-order
    /// delivery cannot move the timestamp backward.
    fn touch_validation(&self, key: &str, now: DateTime<Utc>) -> Result<(), LicenseError>;

    /// Revoke a license from `pending` or `active`.
    ///
    /// Already-revoked licenses are returned unchanged — the original
    /// reason is never overwritten. Returns `None` if no record exists.
    fn revoke(
        &self,
        key: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<License>, LicenseError>;

    /// Permanently remove a record. Returns whether anything was removed.
    fn delete(&self, key: &str) -> Result<bool, LicenseError>;
}
