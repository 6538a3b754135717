//! Configuration management for the resale engine.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable values fall back to the default.

use crate::policy::{ResalePolicy, DEFAULT_COOLDOWN_HOURS, DEFAULT_MAX_RESALES};
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Store runtime configuration
    pub runtime: RuntimeConfig,
    /// Resale limits
    pub resale: ResaleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

/// Store runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of the action and notification broadcast channels
    pub broadcast_capacity: usize,
    /// How long a caller waits for a command outcome, in milliseconds
    pub request_timeout_ms: u64,
}

impl RuntimeConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Resale limits and issuing authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResaleConfig {
    /// Waiting period after original issuance, in hours
    pub cooldown_hours: i64,
    /// Resales allowed per ticket
    pub max_resales: u8,
    /// Accounts allowed to issue tickets
    pub admins: Vec<String>,
}

impl ResaleConfig {
    /// Resale policy built from these settings
    #[must_use]
    pub fn policy(&self) -> ResalePolicy {
        ResalePolicy::new(chrono::Duration::hours(self.cooldown_hours), self.max_resales)
    }

    /// Configured administrators as account handles
    #[must_use]
    pub fn admin_accounts(&self) -> Vec<AccountId> {
        self.admins.iter().map(AccountId::new).collect()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RESALE_LOG_LEVEL`: Default log filter (default: info)
    /// - `RESALE_BROADCAST_CAPACITY`: Broadcast channel capacity (default: 256)
    /// - `RESALE_REQUEST_TIMEOUT_MS`: Outcome wait in milliseconds (default: 5000)
    /// - `RESALE_COOLDOWN_HOURS`: Resale waiting period (default: 24)
    /// - `RESALE_MAX_RESALES`: Resales per ticket (default: 2)
    /// - `RESALE_ADMINS`: Comma-separated issuing accounts (default: issuer)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    fn from_source(get: impl Fn(&str) -> Option<String>) -> Self {
        let admins: Vec<String> = get("RESALE_ADMINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            logging: LoggingConfig {
                level: get("RESALE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
            runtime: RuntimeConfig {
                broadcast_capacity: get("RESALE_BROADCAST_CAPACITY")
                    .and_then(|s| s.parse().ok())
                    .filter(|capacity| *capacity > 0)
                    .unwrap_or(256),
                request_timeout_ms: get("RESALE_REQUEST_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            },
            resale: ResaleConfig {
                cooldown_hours: get("RESALE_COOLDOWN_HOURS")
                    .and_then(|s| s.parse().ok())
                    .filter(|hours| *hours >= 0)
                    .unwrap_or(DEFAULT_COOLDOWN_HOURS),
                max_resales: get("RESALE_MAX_RESALES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_RESALES),
                admins: if admins.is_empty() {
                    vec!["issuer".to_string()]
                } else {
                    admins
                },
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.runtime.broadcast_capacity, 256);
        assert_eq!(config.runtime.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.resale.policy(), ResalePolicy::default());
        assert_eq!(config.resale.admin_accounts(), vec![AccountId::new("issuer")]);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("RESALE_LOG_LEVEL", "debug"),
            ("RESALE_REQUEST_TIMEOUT_MS", "250"),
            ("RESALE_COOLDOWN_HOURS", "48"),
            ("RESALE_MAX_RESALES", "5"),
            ("RESALE_ADMINS", "box-office, promoter ,,"),
        ]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.runtime.request_timeout_ms, 250);
        assert_eq!(config.resale.policy().cooldown, chrono::Duration::hours(48));
        assert_eq!(config.resale.max_resales, 5);
        assert_eq!(config.resale.admins, vec!["box-office", "promoter"]);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("RESALE_BROADCAST_CAPACITY", "0"),
            ("RESALE_REQUEST_TIMEOUT_MS", "soon"),
            ("RESALE_COOLDOWN_HOURS", "-3"),
            ("RESALE_MAX_RESALES", "300"),
            ("RESALE_ADMINS", " , "),
        ]);
        assert_eq!(config, Config::default());
    }
}
