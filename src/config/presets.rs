//! Preset catalog file loading.
//!
//! File format:
//!
//! ```toml
//! [[preset]]
//! name = "swap_quote"
//! required = ["wallet_address", "sell_token", "buy_token", "sell_amount"]
//! method = "GET"
//! url = "https://api.0x.org/swap/v1/quote"
//! query = [
//!     ["sellToken", "sell_token"],
//!     ["buyToken", "buy_token"],
//!     ["sellAmount", "sell_amount"],
//!     ["takerAddress", "wallet_address"],
//! ]
//! result_register = "swap_quote"
//! ```
//!
//! Query parameters are an ordered list of `[param, register]` pairs so the
//! emitted query string is deterministic.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::presets::{HttpMethod, PresetCatalog, PresetDefinition, RequestTemplate};

#[derive(Debug, Deserialize)]
struct PresetCatalogFile {
    #[serde(default)]
    preset: Vec<PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    name: String,
    #[serde(default)]
    required: Vec<String>,
    method: HttpMethod,
    url: String,
    #[serde(default)]
    query: Vec<(String, String)>,
    result_register: Option<String>,
    result_filter: Option<String>,
}

/// Load a preset catalog from a TOML file, or the standard catalog when no
/// path is configured.
pub fn load_preset_catalog(path: Option<&Path>) -> Result<PresetCatalog, ConfigError> {
    let Some(path) = path else {
        tracing::debug!("no preset catalog file configured, using standard catalog");
        return Ok(PresetCatalog::standard());
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let file: PresetCatalogFile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let definitions = file.preset.into_iter().map(|entry| PresetDefinition {
        name: entry.name,
        required_registers: entry.required,
        template: RequestTemplate {
            method: entry.method,
            url_pattern: entry.url,
            query_params: entry.query,
        },
        result_register: entry.result_register,
        result_filter: entry.result_filter,
    });

    let catalog = PresetCatalog::new(definitions)?;
    tracing::info!(
        presets = catalog.len(),
        path = %path.display(),
        "loaded preset catalog"
    );
    Ok(catalog)
}
