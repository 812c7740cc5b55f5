//! Cache configuration.
//!
//! [`CacheConfig`] names the key namespace a coordinator owns and the
//! well-known key under which it records the logic fingerprint. It derives
//! `Deserialize` with field defaults so a host application can embed it in
//! its own configuration file.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::key::{NAMESPACE_SEPARATOR, namespace_prefix};

/// Default operation tag prefixed to every result key.
pub const DEFAULT_NAMESPACE: &str = "GetEmployees";

/// Default key holding the stored logic fingerprint.
pub const DEFAULT_FINGERPRINT_KEY: &str = "EmployeeServiceCodeLogicHash";

/// Configuration errors reported by [`CacheConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cache namespace must not be empty")]
    EmptyNamespace,

    #[error("cache namespace {namespace:?} must not contain ':'")]
    NamespaceSeparator { namespace: String },

    #[error("fingerprint key must not be empty")]
    EmptyFingerprintKey,

    #[error("fingerprint key {key:?} lies inside result namespace {namespace:?}")]
    FingerprintInNamespace { key: String, namespace: String },
}

/// Settings for one [`QueryCache`](crate::coordinator::QueryCache).
///
/// # Examples
///
/// ```
/// use qcache::config::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_namespace("GetContractors")
///     .with_fingerprint_key("ContractorLogicHash");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Operation tag prefixed to every result key.
    pub namespace: String,
    /// Key under which the current logic fingerprint is stored.
    pub fingerprint_key: String,
    /// When `false`, every request goes straight to the record source.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            fingerprint_key: DEFAULT_FINGERPRINT_KEY.to_owned(),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_fingerprint_key(mut self, key: impl Into<String>) -> Self {
        self.fingerprint_key = key.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A configuration that bypasses the cache entirely.
    pub fn disabled() -> Self {
        Self::default().with_enabled(false)
    }

    /// Prefix shared by every result key of this namespace.
    pub fn key_prefix(&self) -> String {
        namespace_prefix(&self.namespace)
    }

    /// Check that the namespace and fingerprint key cannot shadow each other.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.namespace.contains(NAMESPACE_SEPARATOR) {
            return Err(ConfigError::NamespaceSeparator {
                namespace: self.namespace.clone(),
            });
        }
        if self.fingerprint_key.is_empty() {
            return Err(ConfigError::EmptyFingerprintKey);
        }
        if self.fingerprint_key.starts_with(&self.key_prefix()) {
            return Err(ConfigError::FingerprintInNamespace {
                key: self.fingerprint_key.clone(),
                namespace: self.namespace.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.namespace, "GetEmployees");
        assert_eq!(config.key_prefix(), "GetEmployees:");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn empty_values_rejected() {
        assert_eq!(
            CacheConfig::default().with_namespace("").validate(),
            Err(ConfigError::EmptyNamespace)
        );
        assert_eq!(
            CacheConfig::default().with_fingerprint_key("").validate(),
            Err(ConfigError::EmptyFingerprintKey)
        );
    }

    #[test]
    fn namespace_with_separator_rejected() {
        let err = CacheConfig::default()
            .with_namespace("a:b")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NamespaceSeparator { .. }));
    }

    #[test]
    fn fingerprint_key_inside_namespace_rejected() {
        let err = CacheConfig::default()
            .with_fingerprint_key("GetEmployees:logic")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FingerprintInNamespace { .. }));
    }

    #[test]
    fn disabled_keeps_defaults() {
        let config = CacheConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(config.fingerprint_key, DEFAULT_FINGERPRINT_KEY);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }
}
