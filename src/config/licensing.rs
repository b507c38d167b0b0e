//! Licensing configuration loading from config.toml
//!
//! The `[licensing]` table controls the time parameters of the subscription
//! state machine: the grace period granted after a missed payment, the
//! renewal reminder thresholds, and how often the sweep runs. Every field has
//! a default, and a missing config.toml falls back to defaults entirely, so a
//! bare deployment works without any file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Licensing time parameters
    #[serde(default)]
    pub licensing: LicensingConfig,
}

/// Time parameters for the subscription lifecycle
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LicensingConfig {
    /// Days a subscription stays usable past `period_end` before expiring
    pub grace_period_days: i64,
    /// Days before `period_end` at which renewal reminders fire
    pub reminder_days: Vec<i64>,
    /// Seconds between scheduled sweep runs
    pub sweep_interval_secs: u64,
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: 3,
            reminder_days: vec![7, 3, 1],
            sweep_interval_secs: 3600,
        }
    }
}

/// Loads licensing configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range (negative grace period, negative reminder day,
///   zero sweep interval)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    validate(&config.licensing)?;
    Ok(config)
}

/// Loads configuration from the default location (./config.toml), falling
/// back to built-in defaults when the file does not exist. A file that exists
/// but fails to parse is still an error.
pub fn load_or_default() -> Result<Config> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(licensing: &LicensingConfig) -> Result<()> {
    if licensing.grace_period_days < 0 {
        return Err(Error::Config {
            message: format!(
                "grace_period_days must be non-negative, got {}",
                licensing.grace_period_days
            ),
        });
    }

    if licensing.reminder_days.iter().any(|&days| days < 0) {
        return Err(Error::Config {
            message: "reminder_days entries must be non-negative".to_string(),
        });
    }

    // The daemon turns this into a tokio interval, which requires a
    // non-zero period
    if licensing.sweep_interval_secs == 0 {
        return Err(Error::Config {
            message: "sweep_interval_secs must be positive".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_licensing_config() {
        let toml_str = r"
            [licensing]
            grace_period_days = 5
            reminder_days = [14, 7, 1]
            sweep_interval_secs = 600
        ";

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.licensing.grace_period_days, 5);
        assert_eq!(config.licensing.reminder_days, vec![14, 7, 1]);
        assert_eq!(config.licensing.sweep_interval_secs, 600);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let toml_str = r"
            [licensing]
            grace_period_days = 7
        ";

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.licensing.grace_period_days, 7);
        assert_eq!(config.licensing.reminder_days, vec![7, 3, 1]);
        assert_eq!(config.licensing.sweep_interval_secs, 3600);
    }

    #[test]
    fn test_missing_table_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.licensing.grace_period_days, 3);
        assert_eq!(config.licensing.reminder_days, vec![7, 3, 1]);
    }

    #[test]
    fn test_negative_grace_period_is_rejected() {
        let licensing = LicensingConfig {
            grace_period_days: -1,
            ..LicensingConfig::default()
        };

        let result = validate(&licensing);
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }

    #[test]
    fn test_negative_reminder_day_is_rejected() {
        let licensing = LicensingConfig {
            reminder_days: vec![7, -3, 1],
            ..LicensingConfig::default()
        };

        let result = validate(&licensing);
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let licensing = LicensingConfig {
            sweep_interval_secs: 0,
            ..LicensingConfig::default()
        };

        let result = validate(&licensing);
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }
}
