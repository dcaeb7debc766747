//! Register values and entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registers::validators::ValueFormat;

/// A validated value held in a register.
///
/// The variant is fixed at write time by the guard policy's declared format
/// for the key, so readers never have to guess what they are holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RegisterValue {
    /// A plain string (addresses, symbols, identifiers).
    Text(String),
    /// A base-10 integer string in the asset's smallest unit.
    Amount(String),
    /// An opaque JSON value (pre-built transaction objects, quote results).
    Json(serde_json::Value),
}

impl RegisterValue {
    /// The string form substituted into request templates.
    ///
    /// JSON values serialize compactly; text and amounts pass through
    /// verbatim so substitution is byte-stable.
    pub fn to_param_string(&self) -> String {
        match self {
            Self::Text(s) | Self::Amount(s) => s.clone(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// The JSON form handed to a tool when a register is bound to one of
    /// its parameters.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) | Self::Amount(s) => serde_json::Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Borrow the inner JSON value, if this is a JSON register.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Build a register value of the declared format from raw JSON, as
    /// produced by a tool result or a caching directive.
    ///
    /// Returns a reason string on mismatch; the store turns that into
    /// `InvalidValueFormat` without mutating anything.
    pub fn from_json(format: ValueFormat, value: &serde_json::Value) -> Result<Self, String> {
        match format {
            ValueFormat::Address | ValueFormat::Amount => match value.as_str() {
                Some(s) => Ok(match format {
                    ValueFormat::Address => Self::Text(s.to_string()),
                    ValueFormat::Amount => Self::Amount(s.to_string()),
                    ValueFormat::Json => unreachable!(),
                }),
                None => Err(format!("expected a JSON string, got {}", kind_of(value))),
            },
            ValueFormat::Json => Ok(Self::Json(value.clone())),
        }
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// One register slot: a validated value plus write-origin metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEntry {
    /// Register key, unique within the session.
    pub key: String,
    /// The validated value.
    pub value: RegisterValue,
    /// The tool (or `preset:<name>`) that originated the write.
    pub origin_tool: String,
    /// When the write committed.
    pub written_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_string_is_verbatim_for_text_and_amount() {
        assert_eq!(
            RegisterValue::Text("0xabc".into()).to_param_string(),
            "0xabc"
        );
        assert_eq!(
            RegisterValue::Amount("1000000".into()).to_param_string(),
            "1000000"
        );
    }

    #[test]
    fn param_string_compacts_json() {
        let v = RegisterValue::Json(serde_json::json!({"to": "0xabc", "value": "0"}));
        assert_eq!(v.to_param_string(), r#"{"to":"0xabc","value":"0"}"#);
    }

    #[test]
    fn from_json_rejects_non_string_amounts() {
        let err = RegisterValue::from_json(ValueFormat::Amount, &serde_json::json!(1000))
            .unwrap_err();
        assert!(err.contains("number"));
    }

    #[test]
    fn from_json_accepts_any_json_for_json_format() {
        let v = RegisterValue::from_json(ValueFormat::Json, &serde_json::json!([1, 2])).unwrap();
        assert_eq!(v, RegisterValue::Json(serde_json::json!([1, 2])));
    }

    #[test]
    fn serde_round_trip_is_tagged() {
        let v = RegisterValue::Amount("42".into());
        let s = serde_json::to_string(&v).unwrap();
        assert!(s.contains("amount"));
        let back: RegisterValue = serde_json::from_str(&s).unwrap();
        assert_eq!(back, v);
    }
}
