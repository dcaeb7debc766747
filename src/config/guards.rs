//! Guard policy file loading.
//!
//! File format:
//!
//! ```toml
//! [[register]]
//! key = "sell_token"
//! format = "address"
//! origins = ["token_lookup"]
//!
//! [[register]]
//! key = "sell_amount"
//! format = "amount"
//! origins = ["any"]
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::registers::validators::validate_key;
use crate::registers::{GuardPolicy, GuardRule, ValueFormat, WriteRule};

#[derive(Debug, Deserialize)]
struct GuardPolicyFile {
    #[serde(default)]
    register: Vec<RegisterEntry>,
}

#[derive(Debug, Deserialize)]
struct RegisterEntry {
    key: String,
    format: ValueFormat,
    origins: Vec<String>,
}

/// Load a guard policy from a TOML file, or the standard table when no
/// path is configured. A configured-but-missing file is an error, since a
/// silently absent policy would weaken every guarantee downstream.
pub fn load_guard_policy(path: Option<&Path>) -> Result<GuardPolicy, ConfigError> {
    let Some(path) = path else {
        tracing::debug!("no guard policy file configured, using standard table");
        return Ok(GuardPolicy::standard());
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let file: GuardPolicyFile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut rules = Vec::with_capacity(file.register.len());
    for entry in file.register {
        validate_key(&entry.key).map_err(|reason| ConfigError::Invalid {
            reason: format!("guard policy key '{}': {}", entry.key, reason),
        })?;
        if entry.origins.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "guard policy key '{}' has no origins; use [\"any\"] for agent-settable",
                    entry.key
                ),
            });
        }
        let rule = if entry.origins.iter().any(|o| o == "any") {
            WriteRule::Any
        } else {
            WriteRule::origins(entry.origins)
        };
        rules.push((
            entry.key,
            GuardRule {
                format: entry.format,
                rule,
            },
        ));
    }

    tracing::info!(
        keys = rules.len(),
        path = %path.display(),
        "loaded guard policy"
    );
    Ok(GuardPolicy::from_rules(rules))
}
