//! Tool registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::tools::tool::{Tool, validate_tool_schema};

/// The fixed set of tools the gate can dispatch to.
///
/// Registration validates each declaration's parameter schema so structural
/// mistakes surface at startup, not mid-conversation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects duplicate names and malformed schemas.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigError> {
        let decl = tool.declaration();
        let name = decl.name.clone();

        let violations = validate_tool_schema(&decl.parameters, &name);
        if !violations.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "tool '{}' has an invalid parameter schema: {}",
                    name,
                    violations.join("; ")
                ),
            });
        }

        if decl.is_sensitive() && decl.register_param.is_none() && !decl.requires_preset {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "sensitive tool '{}' declares neither a register parameter nor a preset \
                     requirement; it could never receive its critical input",
                    name
                ),
            });
        }

        if self.tools.insert(name.clone(), tool).is_some() {
            return Err(ConfigError::Invalid {
                reason: format!("duplicate tool '{}'", name),
            });
        }

        tracing::debug!(tool = %name, "tool registered");
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Iterate registered tool names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ToolError;
    use crate::tools::tool::{ToolDeclaration, ToolInput, ToolOutput};

    struct FixedTool {
        decl: ToolDeclaration,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn declaration(&self) -> &ToolDeclaration {
            &self.decl
        }

        async fn execute(&self, _input: ToolInput) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("ok"))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FixedTool {
                decl: ToolDeclaration::new("echo", "test"),
            }))
            .unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        for outcome in [true, false] {
            let result = registry.register(Arc::new(FixedTool {
                decl: ToolDeclaration::new("echo", "test"),
            }));
            assert_eq!(result.is_ok(), outcome);
        }
    }

    #[test]
    fn malformed_schema_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register(Arc::new(FixedTool {
                decl: ToolDeclaration::new("bad", "test")
                    .with_parameters(serde_json::json!({"type": "string"})),
            }))
            .unwrap_err();
        assert!(err.to_string().contains("invalid parameter schema"));
    }

    #[test]
    fn sensitive_tool_without_register_input_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register(Arc::new(FixedTool {
                decl: ToolDeclaration::new("send", "broadcast").sensitive(["to"]),
            }))
            .unwrap_err();
        assert!(err.to_string().contains("critical input"));
    }
}
