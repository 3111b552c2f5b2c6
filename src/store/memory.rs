//! In-memory license store.
//!
//! Backs the test suite and single-process embeddings. Every mutation
//! happens under one write-lock acquisition, which makes the conditional
//! `pending → active` transition atomic across threads.

use crate::protocol::models::{License, LicenseStatus};
use crate::store::LicenseStore;
use crate::LicenseError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe in-memory implementation of [`LicenseStore`].
#[derive(Default)]
pub struct MemoryStore {
    licenses: RwLock<HashMap<String, License>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, License>>, LicenseError> {
        self.licenses
            .read()
            .map_err(|_| LicenseError::Store("license store lock poisoned".to_string()))
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, License>>, LicenseError> {
        self.licenses
            .write()
            .map_err(|_| LicenseError::Store("license store lock poisoned".to_string()))
    }
}

impl LicenseStore for MemoryStore {
    fn create_pending(&self, license: License) -> Result<(), LicenseError> {
        let mut guard = self.write_guard()?;
        if guard.contains_key(&license.key) {
            return Err(LicenseError::Store(format!(
                "license key already exists: {}",
                license.key
            )));
        }
        guard.insert(license.key.clone(), license);
        Ok(())
    }

    fn get_by_key(&self, key: &str) -> Result<Option<License>, LicenseError> {
        Ok(self.read_guard()?.get(key).cloned())
    }

    fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<License>, LicenseError> {
        Ok(self
            .read_guard()?
            .values()
            .find(|l| {
                l.status == LicenseStatus::Active
                    && l.device_fingerprint.as_deref() == Some(fingerprint)
            })
            .cloned())
    }

    fn transition_pending_to_active(
        &self,
        key: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<License>, LicenseError> {
        let mut guard = self.write_guard()?;
        let Some(license) = guard.get_mut(key) else {
            return Ok(None);
        };
        if license.status != LicenseStatus::Pending {
            return Ok(None);
        }

        license.status = LicenseStatus::Active;
        license.device_fingerprint = Some(fingerprint.to_string());
        license.activated_at = Some(now);
        license.last_validated_at = Some(now);
        Ok(Some(license.clone()))
    }

    fn touch_validation(&self, key: &str, now: DateTime<Utc>) -> Result<(), LicenseError> {
        let mut guard = self.write_guard()?;
        let Some(license) = guard.get_mut(key) else {
            return Err(LicenseError::Store(format!("no such license: {}", key)));
        };

        // Tolerate out-of-order delivery: never move the timestamp back.
        if license.last_validated_at.map_or(true, |prev| now > prev) {
            license.last_validated_at = Some(now);
        }
        Ok(())
    }

    fn revoke(
        &self,
        key: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<License>, LicenseError> {
        let mut guard = self.write_guard()?;
        let Some(license) = guard.get_mut(key) else {
            return Ok(None);
        };

        if license.status != LicenseStatus::Revoked {
            license.status = LicenseStatus::Revoked;
            license.revoked_at = Some(now);
            license.revoke_reason = Some(reason.to_string());
        }
        Ok(Some(license.clone()))
    }

    fn delete(&self, key: &str) -> Result<bool, LicenseError> {
        Ok(self.write_guard()?.remove(key).is_some())
    }
}
