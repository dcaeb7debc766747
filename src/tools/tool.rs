//! Tool trait and declaration types.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::presets::ResolvedRequest;
use crate::registers::RegisterSummary;

/// Whether a tool's side effect is irreversible and high-stakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Ordinary tool; may take parameters directly from the agent.
    Open,
    /// Critical parameters must come from a register (`from_register`) or a
    /// preset; raw sensitive fields are refused.
    Sensitive,
}

/// Static declaration of a tool: everything the gate needs to police an
/// invocation before the tool runs.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    /// Tool name, as invoked by the agent.
    pub name: String,
    /// Human-readable description, surfaced to the agent loop.
    pub description: String,
    /// JSON Schema for the tool's own parameters (reserved gate parameters
    /// excluded; the gate strips those before the tool sees the payload).
    pub parameters: serde_json::Value,
    /// Whether the tool is sensitive.
    pub sensitivity: Sensitivity,
    /// Raw field names a sensitive invocation must never carry
    /// (`to`, `data`, `value`, `gas`, token addresses, amounts).
    pub guarded_fields: Vec<String>,
    /// The parameter name a `from_register` value is bound to.
    pub register_param: Option<String>,
    /// Dot-path into the result selecting the value a caching directive
    /// stores (e.g. `address` for a token lookup result).
    pub cache_projection: Option<String>,
    /// Whether invocations must name a preset (preset-driven tools).
    pub requires_preset: bool,
    /// Whether the gate includes a value-free register listing in the input.
    pub reads_listing: bool,
    /// Whether the tool runs under the global cross-session lane instead of
    /// a session lane (administrative operations only).
    pub cross_session: bool,
}

impl ToolDeclaration {
    /// Start a declaration with an empty object schema and safe defaults.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            sensitivity: Sensitivity::Open,
            guarded_fields: Vec::new(),
            register_param: None,
            cache_projection: None,
            requires_preset: false,
            reads_listing: false,
            cross_session: false,
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Mark the tool sensitive and name its forbidden raw fields.
    pub fn sensitive<I, S>(mut self, guarded_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitivity = Sensitivity::Sensitive;
        self.guarded_fields = guarded_fields.into_iter().map(Into::into).collect();
        self
    }

    /// Bind `from_register` values to the named parameter.
    pub fn with_register_param(mut self, param: impl Into<String>) -> Self {
        self.register_param = Some(param.into());
        self
    }

    /// Narrow cached results to the given dot-path.
    pub fn with_cache_projection(mut self, path: impl Into<String>) -> Self {
        self.cache_projection = Some(path.into());
        self
    }

    /// Require a `preset` parameter on every invocation.
    pub fn preset_driven(mut self) -> Self {
        self.requires_preset = true;
        self
    }

    /// Request the value-free register listing.
    pub fn with_listing(mut self) -> Self {
        self.reads_listing = true;
        self
    }

    /// Whether the tool is sensitive.
    pub fn is_sensitive(&self) -> bool {
        self.sensitivity == Sensitivity::Sensitive
    }
}

/// The resolved input a tool executes with.
///
/// By the time this is built, stage 1–3 have already run: parameters
/// conform to the schema, reserved fields are stripped, register values are
/// substituted, and any preset is resolved.
#[derive(Debug, Clone)]
pub struct ToolInput {
    /// Effective parameters (reserved fields removed, register bound).
    pub params: serde_json::Value,
    /// The resolved request, for preset-driven tools.
    pub request: Option<ResolvedRequest>,
    /// Value-free register listing, for tools that declared `reads_listing`.
    pub registers: Option<Vec<RegisterSummary>>,
}

impl ToolInput {
    /// Input carrying only parameters.
    pub fn params(params: serde_json::Value) -> Self {
        Self {
            params,
            request: None,
            registers: None,
        }
    }
}

/// What a tool execution produced.
///
/// `summary` is the only text the agent necessarily sees; `result` is the
/// structured value the gate may cache under a register. Sensitive values
/// should stay out of `summary`; the agent references them by register
/// name, not by content.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Human-readable outcome for the agent.
    pub summary: String,
    /// Structured result, source for caching directives.
    pub result: serde_json::Value,
    /// Whether `result` is disclosed to the agent alongside the summary.
    pub disclose_result: bool,
}

impl ToolOutput {
    /// A disclosed result with a summary.
    pub fn success(summary: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            result,
            disclose_result: true,
        }
    }

    /// A result the agent only ever sees by register reference.
    pub fn undisclosed(summary: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            result,
            disclose_result: false,
        }
    }

    /// Plain text output with no structured result.
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            result: serde_json::Value::Null,
            disclose_result: false,
        }
    }
}

/// Trait every tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The static declaration the gate polices against.
    fn declaration(&self) -> &ToolDeclaration;

    /// Execute with fully resolved input. This is the only stage with
    /// real-world side effects.
    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;
}

/// Extract a required string parameter from a JSON object.
pub fn require_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{}' parameter", name)))
}

/// Registration-time validation of a declaration's parameter schema.
///
/// Catches structural mistakes (missing `"type": "object"`, orphan
/// `"required"` keys, arrays without `"items"`) before the tool can be
/// dispatched. Returns a list of violations; empty means valid.
pub fn validate_tool_schema(schema: &serde_json::Value, path: &str) -> Vec<String> {
    let mut errors = Vec::new();

    match schema.get("type").and_then(|t| t.as_str()) {
        Some("object") => {}
        Some(other) => {
            errors.push(format!("{path}: expected type \"object\", got \"{other}\""));
            return errors;
        }
        None => {
            errors.push(format!("{path}: missing \"type\": \"object\""));
            return errors;
        }
    }

    let properties = match schema.get("properties").and_then(|p| p.as_object()) {
        Some(p) => p,
        None => {
            errors.push(format!("{path}: missing or non-object \"properties\""));
            return errors;
        }
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for req in required {
            if let Some(key) = req.as_str()
                && !properties.contains_key(key)
            {
                errors.push(format!(
                    "{path}: required key \"{key}\" not found in properties"
                ));
            }
        }
    }

    for (key, prop) in properties {
        let prop_path = format!("{path}.{key}");
        if let Some(prop_type) = prop.get("type").and_then(|t| t.as_str()) {
            match prop_type {
                "object" => errors.extend(validate_tool_schema(prop, &prop_path)),
                "array" => {
                    if let Some(items) = prop.get("items") {
                        if items.get("type").and_then(|t| t.as_str()) == Some("object") {
                            errors
                                .extend(validate_tool_schema(items, &format!("{prop_path}.items")));
                        }
                    } else {
                        errors.push(format!("{prop_path}: array property missing \"items\""));
                    }
                }
                _ => {}
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_builder_defaults() {
        let decl = ToolDeclaration::new("echo", "test tool");
        assert_eq!(decl.sensitivity, Sensitivity::Open);
        assert!(decl.guarded_fields.is_empty());
        assert!(!decl.requires_preset);
        assert!(!decl.cross_session);
    }

    #[test]
    fn sensitive_builder_sets_guarded_fields() {
        let decl = ToolDeclaration::new("send", "broadcast")
            .sensitive(["to", "data", "value", "gas"])
            .with_register_param("transaction");
        assert!(decl.is_sensitive());
        assert_eq!(decl.guarded_fields.len(), 4);
        assert_eq!(decl.register_param.as_deref(), Some("transaction"));
    }

    #[test]
    fn require_str_present_and_missing() {
        let params = serde_json::json!({"symbol": "USDC"});
        assert_eq!(require_str(&params, "symbol").unwrap(), "USDC");
        assert!(require_str(&params, "network").is_err());
        assert!(require_str(&serde_json::json!({"symbol": 42}), "symbol").is_err());
    }

    #[test]
    fn schema_validation_valid() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string", "description": "Token symbol" }
            },
            "required": ["symbol"]
        });
        assert!(validate_tool_schema(&schema, "test").is_empty());
    }

    #[test]
    fn schema_validation_missing_type() {
        let schema = serde_json::json!({"properties": {}});
        let errors = validate_tool_schema(&schema, "test");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("missing \"type\""));
    }

    #[test]
    fn schema_validation_orphan_required() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "a": { "type": "string" } },
            "required": ["a", "b"]
        });
        let errors = validate_tool_schema(&schema, "test");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("\"b\""));
    }

    #[test]
    fn schema_validation_array_needs_items() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "tags": { "type": "array" } }
        });
        let errors = validate_tool_schema(&schema, "test");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("items"));
    }
}
