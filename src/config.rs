//! Engine configuration, loaded from TOML
use super::balance::LeaveDays;
use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    /// Days granted to an employee who has no balance row yet.
    pub default_leave_allowance: f64,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Deliver on a detached thread after commit instead of inline.
    pub background: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("approvals.db"),
            default_leave_allowance: 15.0,
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 50,
            background: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notifications.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "notifications.max_attempts must be at least 1".into(),
            ));
        }
        self.leave_allowance()?;
        Ok(())
    }

    pub fn leave_allowance(&self) -> Result<LeaveDays, ConfigError> {
        LeaveDays::from_days(self.default_leave_allowance).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "default_leave_allowance must be a non-negative multiple of 0.5, got {}",
                self.default_leave_allowance
            ))
        })
    }

    /// Settings for tests: inline delivery and no retry delay.
    pub fn for_tests() -> Self {
        Self {
            notifications: NotificationConfig {
                max_attempts: 2,
                retry_backoff_ms: 0,
                background: false,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_leave_allowance = 20.5

            [notifications]
            background = false
            "#,
        )
        .unwrap();

        assert_eq!(config.leave_allowance().unwrap(), LeaveDays::from_half_days(41));
        assert!(!config.notifications.background);
        assert_eq!(config.notifications.max_attempts, 3);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let result = EngineConfig::from_toml_str("[notifications]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn quarter_day_allowance_is_invalid() {
        let result = EngineConfig::from_toml_str("default_leave_allowance = 3.25\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
