//! Engine configuration.

use std::time::Duration;

/// Default license validity when the operator does not supply one.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Fixed grace period after the last successful validation during which
/// consumers of a signed assertion still treat an offline device as valid.
/// Independent of the validity period.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Configuration for the license lifecycle engine.
///
/// Constructed once at boot and injected into [`crate::LifecycleEngine`];
/// nothing here changes at runtime.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Product prefix baked into every generated key (e.g., "BWRD").
    pub key_prefix: String,

    /// Validity applied to issued licenses when the operator omits one.
    pub default_validity_days: u32,

    /// Grace period appended to `lastValidatedAt` in signed assertions.
    pub grace_period: Duration,

    /// Namespace for persisted key material under the platform data dir.
    /// Each deployment should use a unique namespace.
    pub key_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: "BWRD".to_string(),
            default_validity_days: DEFAULT_VALIDITY_DAYS,
            grace_period: DEFAULT_GRACE_PERIOD,
            key_namespace: "boothwarden".to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::LicenseError> {
        if self.key_prefix.is_empty() {
            return Err(crate::LicenseError::ConfigError(
                "key_prefix cannot be empty".to_string(),
            ));
        }
        if !self
            .key_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(crate::LicenseError::ConfigError(format!(
                "key_prefix must be alphanumeric, got {:?}",
                self.key_prefix
            )));
        }
        if self.default_validity_days == 0 {
            return Err(crate::LicenseError::ConfigError(
                "default_validity_days must be at least 1".to_string(),
            ));
        }
        if self.grace_period.as_secs() == 0 {
            return Err(crate::LicenseError::ConfigError(
                "grace_period cannot be zero".to_string(),
            ));
        }
        if self.key_namespace.is_empty() {
            return Err(crate::LicenseError::ConfigError(
                "key_namespace cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_prefix_rejected() {
        let config = EngineConfig {
            key_prefix: String::new(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_alphanumeric_prefix_rejected() {
        let config = EngineConfig {
            key_prefix: "BW-RD".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_validity_rejected() {
        let config = EngineConfig {
            default_validity_days: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
