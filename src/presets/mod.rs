//! Preset catalog: named request templates resolved purely from registers.
//!
//! A preset is the only way an outbound quote/price request gets built. The
//! agent picks the preset name; every substituted parameter comes from the
//! session's register store, never from agent text.

mod resolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use resolver::{ResolvedRequest, resolve};

/// HTTP method for a preset template. The catalog is declarative
/// configuration, so only the methods presets actually need are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// The request shape a preset expands to.
///
/// `url_pattern` may embed `{register_key}` placeholders; `query_params` is
/// an ordered list of `(param_name, register_key)` pairs. Ordering is part
/// of the definition so resolution is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    /// HTTP method.
    pub method: HttpMethod,
    /// Base URL, optionally with `{register_key}` path placeholders.
    pub url_pattern: String,
    /// Query parameters in emission order: `(param_name, register_key)`.
    pub query_params: Vec<(String, String)>,
}

/// A statically declared preset.
#[derive(Debug, Clone)]
pub struct PresetDefinition {
    /// Preset name, referenced by the `preset` invocation parameter.
    pub name: String,
    /// Registers that must be set before resolution. Must cover every key
    /// the template references; checked at catalog construction.
    pub required_registers: Vec<String>,
    /// The outbound request shape.
    pub template: RequestTemplate,
    /// Where the gate caches the execution result (derived-only category).
    pub result_register: Option<String>,
    /// Optional dot-path narrowing the result before caching.
    pub result_filter: Option<String>,
}

impl PresetDefinition {
    /// Every register key the template references: path placeholders plus
    /// query-param sources.
    pub fn referenced_registers(&self) -> Vec<String> {
        let mut refs: Vec<String> = placeholders(&self.template.url_pattern);
        for (_, register) in &self.template.query_params {
            refs.push(register.clone());
        }
        refs
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for referenced in self.referenced_registers() {
            if !self.required_registers.contains(&referenced) {
                return Err(ConfigError::Invalid {
                    reason: format!(
                        "preset '{}' references register '{}' but does not declare it \
                         in required_registers",
                        self.name, referenced
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Extract `{key}` placeholders from a URL pattern.
fn placeholders(pattern: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push(rest[open + 1..open + close].to_string());
        rest = &rest[open + close + 1..];
    }
    out
}

/// The immutable, process-wide preset table.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: BTreeMap<String, PresetDefinition>,
}

impl PresetCatalog {
    /// Build a catalog, validating each definition and rejecting duplicates.
    pub fn new<I>(definitions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = PresetDefinition>,
    {
        let mut presets = BTreeMap::new();
        for def in definitions {
            def.validate()?;
            let name = def.name.clone();
            if presets.insert(name.clone(), def).is_some() {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate preset '{}'", name),
                });
            }
        }
        Ok(Self { presets })
    }

    /// The default catalog: a 0x-style swap quote lookup, matching the
    /// standard guard policy's `swap_quote` derived-only key.
    pub fn standard() -> Self {
        Self::new([PresetDefinition {
            name: "swap_quote".to_string(),
            required_registers: vec![
                "wallet_address".to_string(),
                "sell_token".to_string(),
                "buy_token".to_string(),
                "sell_amount".to_string(),
            ],
            template: RequestTemplate {
                method: HttpMethod::Get,
                url_pattern: "https://api.0x.org/swap/v1/quote".to_string(),
                query_params: vec![
                    ("sellToken".to_string(), "sell_token".to_string()),
                    ("buyToken".to_string(), "buy_token".to_string()),
                    ("sellAmount".to_string(), "sell_amount".to_string()),
                    ("takerAddress".to_string(), "wallet_address".to_string()),
                ],
            },
            result_register: Some("swap_quote".to_string()),
            result_filter: None,
        }])
        .expect("standard catalog is internally consistent")
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> Option<&PresetDefinition> {
        self.presets.get(name)
    }

    /// Iterate declared preset names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Number of presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_extraction() {
        assert_eq!(
            placeholders("https://api.example/v1/{chain}/quote/{pair}"),
            vec!["chain".to_string(), "pair".to_string()]
        );
        assert!(placeholders("https://api.example/no/params").is_empty());
    }

    #[test]
    fn standard_catalog_has_swap_quote() {
        let catalog = PresetCatalog::standard();
        let def = catalog.get("swap_quote").unwrap();
        assert_eq!(def.required_registers.len(), 4);
        assert_eq!(def.result_register.as_deref(), Some("swap_quote"));
    }

    #[test]
    fn undeclared_reference_is_a_config_error() {
        let result = PresetCatalog::new([PresetDefinition {
            name: "bad".to_string(),
            required_registers: vec!["a".to_string()],
            template: RequestTemplate {
                method: HttpMethod::Get,
                url_pattern: "https://api.example/{a}".to_string(),
                query_params: vec![("q".to_string(), "undeclared".to_string())],
            },
            result_register: None,
            result_filter: None,
        }]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("undeclared"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let def = PresetDefinition {
            name: "dup".to_string(),
            required_registers: vec![],
            template: RequestTemplate {
                method: HttpMethod::Get,
                url_pattern: "https://api.example/".to_string(),
                query_params: vec![],
            },
            result_register: None,
            result_filter: None,
        };
        assert!(PresetCatalog::new([def.clone(), def]).is_err());
    }
}
