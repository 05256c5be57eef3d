//! Engine settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable settings for the permission engine.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Smallest page size accepted by enumeration.
    pub min_page_size: usize,

    /// Page sizes above this are clamped.
    pub max_page_size: usize,

    /// Page size used when the caller supplies none.
    pub default_page_size: usize,

    /// How long a single rule provider may take before it is ignored.
    pub provider_timeout_ms: u64,

    /// Capacity of the recent-checks diagnostic log.
    pub check_log_capacity: usize,

    /// Make every built-in action default to deny.
    pub default_deny: bool,

    /// Whether `execute-sql` defaults to allow.
    pub default_allow_sql: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_page_size: 1,
            max_page_size: 200,
            default_page_size: 50,
            provider_timeout_ms: 5_000,
            check_log_capacity: 200,
            default_deny: false,
            default_allow_sql: true,
        }
    }
}

impl EngineSettings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings are internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "min_page_size must be at least 1".to_string(),
            ));
        }
        if self.min_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(format!(
                "min_page_size {} exceeds max_page_size {}",
                self.min_page_size, self.max_page_size
            )));
        }
        if self.default_page_size < self.min_page_size || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(format!(
                "default_page_size {} outside [{}, {}]",
                self.default_page_size, self.min_page_size, self.max_page_size
            )));
        }
        if self.provider_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "provider_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_page_size, 200);
        assert_eq!(settings.provider_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = EngineSettings::from_toml_str(
            r#"
            max_page_size = 100
            default_deny = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.max_page_size, 100);
        assert!(settings.default_deny);
        assert_eq!(settings.min_page_size, 1);
        assert_eq!(settings.default_page_size, 50);
    }

    #[test]
    fn test_from_toml_empty() {
        assert_eq!(EngineSettings::from_toml_str("").unwrap(), EngineSettings::default());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        assert!(EngineSettings::from_toml_str("min_page_size = 0").is_err());
        assert!(EngineSettings::from_toml_str("min_page_size = 10\nmax_page_size = 5\ndefault_page_size = 5").is_err());
        assert!(EngineSettings::from_toml_str("default_page_size = 500").is_err());
        assert!(EngineSettings::from_toml_str("provider_timeout_ms = 0").is_err());
    }

    #[test]
    fn test_from_toml_syntax_error() {
        let err = EngineSettings::from_toml_str("max_page_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
