//! Tool invocation envelope.

use serde_json::{Map, Value};

use crate::error::GateError;

/// Parameters the gate consumes itself and strips from the payload the
/// underlying tool sees.
pub const RESERVED_PARAMS: [&str; 3] = ["cache_as", "from_register", "preset"];

/// A parsed `{ tool, params }` invocation from the agent-facing dispatch
/// layer.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Tool name.
    pub tool: String,
    /// Raw parameters, reserved fields included.
    pub params: Map<String, Value>,
}

/// The reserved gate directives extracted from an invocation.
#[derive(Debug, Clone, Default)]
pub struct ReservedParams {
    /// Register to cache the result under.
    pub cache_as: Option<String>,
    /// Register (optionally `key.path`) substituted as the tool's input.
    pub from_register: Option<String>,
    /// Preset to resolve.
    pub preset: Option<String>,
}

impl ToolInvocation {
    /// Build an invocation directly.
    pub fn new(tool: impl Into<String>, params: Value) -> Result<Self, GateError> {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(GateError::MalformedInvocation {
                    reason: format!("params must be an object, got {}", json_kind(&other)),
                });
            }
        };
        Ok(Self {
            tool: tool.into(),
            params,
        })
    }

    /// Parse the wire form `{ "tool": ..., "params": {...} }`.
    pub fn parse(value: Value) -> Result<Self, GateError> {
        let Value::Object(mut map) = value else {
            return Err(GateError::MalformedInvocation {
                reason: "invocation must be a JSON object".to_string(),
            });
        };
        let tool = match map.remove("tool") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(GateError::MalformedInvocation {
                    reason: "'tool' must be a string".to_string(),
                });
            }
            None => {
                return Err(GateError::MalformedInvocation {
                    reason: "missing 'tool'".to_string(),
                });
            }
        };
        let params = map.remove("params").unwrap_or(Value::Null);
        Self::new(tool, params)
    }

    /// Extract and type-check the reserved directives.
    pub fn reserved(&self) -> Result<ReservedParams, GateError> {
        let mut out = ReservedParams::default();
        for name in RESERVED_PARAMS {
            let Some(value) = self.params.get(name) else {
                continue;
            };
            let Some(s) = value.as_str() else {
                return Err(GateError::MalformedInvocation {
                    reason: format!("'{}' must be a string", name),
                });
            };
            match name {
                "cache_as" => out.cache_as = Some(s.to_string()),
                "from_register" => out.from_register = Some(s.to_string()),
                "preset" => out.preset = Some(s.to_string()),
                _ => unreachable!(),
            }
        }
        Ok(out)
    }

    /// Parameters with the reserved directives removed: the payload the
    /// underlying tool is allowed to see.
    pub fn stripped_params(&self) -> Map<String, Value> {
        self.params
            .iter()
            .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A `from_register` reference: a key plus an optional dot-path projecting
/// into a JSON-valued entry (`swap_quote.to`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRef {
    /// The register key.
    pub key: String,
    /// Optional projection path within the entry's JSON value.
    pub path: Option<String>,
}

impl RegisterRef {
    /// Split `key` or `key.path.to.field` at the first dot.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((key, path)) => Self {
                key: key.to_string(),
                path: Some(path.to_string()),
            },
            None => Self {
                key: reference.to_string(),
                path: None,
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wire_form() {
        let inv = ToolInvocation::parse(serde_json::json!({
            "tool": "token_lookup",
            "params": {"symbol": "USDC", "cache_as": "sell_token"}
        }))
        .unwrap();
        assert_eq!(inv.tool, "token_lookup");
        let reserved = inv.reserved().unwrap();
        assert_eq!(reserved.cache_as.as_deref(), Some("sell_token"));
        assert!(reserved.from_register.is_none());
    }

    #[test]
    fn parse_rejects_non_object() {
        assert!(ToolInvocation::parse(serde_json::json!("token_lookup")).is_err());
        assert!(ToolInvocation::parse(serde_json::json!({"params": {}})).is_err());
        assert!(ToolInvocation::parse(serde_json::json!({"tool": 7})).is_err());
    }

    #[test]
    fn params_default_to_empty() {
        let inv = ToolInvocation::parse(serde_json::json!({"tool": "register_list"})).unwrap();
        assert!(inv.params.is_empty());
    }

    #[test]
    fn reserved_must_be_strings() {
        let inv = ToolInvocation::new(
            "x",
            serde_json::json!({"cache_as": 42}),
        )
        .unwrap();
        assert!(inv.reserved().is_err());
    }

    #[test]
    fn stripping_removes_only_reserved() {
        let inv = ToolInvocation::new(
            "x",
            serde_json::json!({
                "symbol": "ETH",
                "cache_as": "sell_token",
                "from_register": "a",
                "preset": "p"
            }),
        )
        .unwrap();
        let stripped = inv.stripped_params();
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key("symbol"));
    }

    #[test]
    fn register_ref_parsing() {
        assert_eq!(
            RegisterRef::parse("swap_quote"),
            RegisterRef {
                key: "swap_quote".into(),
                path: None
            }
        );
        assert_eq!(
            RegisterRef::parse("swap_quote.tx.gas"),
            RegisterRef {
                key: "swap_quote".into(),
                path: Some("tx.gas".into())
            }
        );
    }
}
