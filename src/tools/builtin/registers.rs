//! Generic register tools.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolDeclaration, ToolInput, ToolOutput};

/// The generic agent-settable write path.
///
/// The value itself travels through the caching directive: the agent calls
/// `register_set` with `value` and `cache_as`, and the gate commits the
/// write after execution under origin `register_set`. Guarded keys reject
/// that origin, and the rejection names the tool that is allowed: the
/// agent is told *which* producer to call instead of being able to forge
/// the value here.
pub struct RegisterSetTool {
    decl: ToolDeclaration,
}

impl RegisterSetTool {
    /// Tool name, referenced by the standard guard policy.
    pub const NAME: &'static str = "register_set";

    pub fn new() -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "Store a value in a session register. Name the destination register with \
             cache_as. Only agent-settable registers accept this tool; guarded \
             registers name the lookup tool that owns them.",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "value": {
                    "description": "The value to store. Amount registers take base-10 integer strings."
                }
            },
            "required": ["value"]
        }));
        Self { decl }
    }
}

impl Default for RegisterSetTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for RegisterSetTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let value = input
            .params
            .get("value")
            .ok_or_else(|| ToolError::InvalidParameters("missing 'value' parameter".into()))?;
        // The write itself happens in the gate's caching stage; this tool
        // just hands the value through.
        Ok(ToolOutput::undisclosed("value staged for register write", value.clone()))
    }
}

/// Value-free register listing.
///
/// Discloses key names, origins, and write times, never the raw values, so
/// an agent can see *what* is available without ever seeing the bytes.
pub struct RegisterListTool {
    decl: ToolDeclaration,
}

impl RegisterListTool {
    /// Tool name.
    pub const NAME: &'static str = "register_list";

    pub fn new() -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "List the registers set in this session: key, origin tool, and write time. \
             Values are never shown; reference them by key via from_register.",
        )
        .with_listing();
        Self { decl }
    }
}

impl Default for RegisterListTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for RegisterListTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let summaries = input.registers.unwrap_or_default();
        let lines: Vec<String> = summaries
            .iter()
            .map(|s| format!("{} (written by {})", s.key, s.origin_tool))
            .collect();
        let summary = if lines.is_empty() {
            "no registers set in this session".to_string()
        } else {
            lines.join("\n")
        };
        let result = serde_json::to_value(&summaries)
            .map_err(|e| ToolError::Failed(format!("listing serialization failed: {}", e)))?;
        Ok(ToolOutput::success(summary, result))
    }
}
