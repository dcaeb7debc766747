//! Startup configuration.
//!
//! Settings resolve from the environment (a `.env` file is honored via
//! `dotenvy`); the guard policy, preset catalog, and token table load from
//! TOML files with compiled-in defaults when no file is configured.

mod guards;
mod presets;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::registers::{AddressStrictness, ValidatorConfig};
use crate::registers::validators::DEFAULT_MAX_AMOUNT_DIGITS;

pub use guards::load_guard_policy;
pub use presets::load_preset_catalog;

/// Core settings, resolved once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Address validation strictness.
    pub address_strictness: AddressStrictness,
    /// Maximum digits accepted in an amount string.
    pub max_amount_digits: usize,
    /// How long a dispatch waits for its session lane.
    pub lane_timeout: Duration,
    /// Hard deadline on a single tool execution.
    pub invocation_deadline: Duration,
    /// Idle interval after which a session is pruned.
    pub session_idle_timeout: Duration,
    /// Optional guard policy TOML file.
    pub guard_policy_path: Option<PathBuf>,
    /// Optional preset catalog TOML file.
    pub preset_catalog_path: Option<PathBuf>,
    /// Optional token table TOML file.
    pub token_table_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            address_strictness: AddressStrictness::default(),
            max_amount_digits: DEFAULT_MAX_AMOUNT_DIGITS,
            lane_timeout: Duration::from_secs(30),
            invocation_deadline: Duration::from_secs(60),
            session_idle_timeout: Duration::from_secs(30 * 60),
            guard_policy_path: None,
            preset_catalog_path: None,
            token_table_path: None,
        }
    }
}

impl CoreConfig {
    /// Resolve from `PALISADE_*` environment variables, falling back to
    /// defaults. A `.env` file in the working directory is honored.
    pub fn resolve() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Ok(Self {
            address_strictness: parse_strictness_env("PALISADE_ADDRESS_STRICTNESS")?,
            max_amount_digits: parse_usize_env(
                "PALISADE_MAX_AMOUNT_DIGITS",
                DEFAULT_MAX_AMOUNT_DIGITS,
            )?,
            lane_timeout: parse_secs_env("PALISADE_LANE_TIMEOUT_SECS", 30)?,
            invocation_deadline: parse_secs_env("PALISADE_INVOCATION_DEADLINE_SECS", 60)?,
            session_idle_timeout: parse_secs_env("PALISADE_SESSION_IDLE_SECS", 30 * 60)?,
            guard_policy_path: optional_env("PALISADE_GUARD_POLICY_FILE").map(PathBuf::from),
            preset_catalog_path: optional_env("PALISADE_PRESET_CATALOG_FILE").map(PathBuf::from),
            token_table_path: optional_env("PALISADE_TOKEN_TABLE_FILE").map(PathBuf::from),
        })
    }

    /// The validator settings slice of this config.
    pub fn validators(&self) -> ValidatorConfig {
        ValidatorConfig {
            address_strictness: self.address_strictness,
            max_amount_digits: self.max_amount_digits,
        }
    }
}

/// Read an optional environment variable, treating empty as unset.
pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_env(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Var {
            name: name.to_string(),
            reason: format!("'{}' is not a non-negative integer", raw),
        }),
    }
}

fn parse_secs_env(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match optional_env(name) {
        None => Ok(Duration::from_secs(default_secs)),
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Var {
                name: name.to_string(),
                reason: format!("'{}' is not a number of seconds", raw),
            }),
    }
}

fn parse_strictness_env(name: &str) -> Result<AddressStrictness, ConfigError> {
    match optional_env(name).as_deref() {
        None => Ok(AddressStrictness::default()),
        Some("lenient") => Ok(AddressStrictness::Lenient),
        Some("strict") => Ok(AddressStrictness::Strict),
        Some(other) => Err(ConfigError::Var {
            name: name.to_string(),
            reason: format!("'{}' is not one of: lenient, strict", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CoreConfig::default();
        assert_eq!(config.address_strictness, AddressStrictness::Strict);
        assert_eq!(config.max_amount_digits, 78);
        assert!(config.guard_policy_path.is_none());
    }

    #[test]
    fn validators_slice() {
        let config = CoreConfig::default();
        let validators = config.validators();
        assert_eq!(validators.max_amount_digits, config.max_amount_digits);
    }
}
