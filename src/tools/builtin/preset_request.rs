//! Preset-driven request tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ToolError;
use crate::executor::RequestExecutor;
use crate::tools::tool::{Tool, ToolDeclaration, ToolInput, ToolOutput};

/// Executes a declared preset through the external request executor.
///
/// The invocation names the preset; the gate resolves it purely from the
/// session's registers and hands the finished request here. The raw result
/// is not disclosed; the agent gets a summary and, with `cache_as`, a
/// register reference for downstream tools.
pub struct PresetRequestTool {
    decl: ToolDeclaration,
    executor: Arc<dyn RequestExecutor>,
}

impl PresetRequestTool {
    /// Tool name.
    pub const NAME: &'static str = "preset_request";

    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "Execute a declared request preset (e.g. swap_quote). Parameters come \
             entirely from session registers; set the required registers first. \
             Use cache_as to store the result for downstream tools.",
        )
        .preset_driven();
        Self { decl, executor }
    }
}

#[async_trait]
impl Tool for PresetRequestTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let request = input.request.ok_or_else(|| {
            ToolError::InvalidParameters("no resolved preset request supplied".into())
        })?;

        let result = self.executor.execute(&request).await?;

        tracing::info!(preset = %request.preset, "preset request executed");

        Ok(ToolOutput::undisclosed(
            format!("preset '{}' executed", request.preset),
            json!(result),
        ))
    }
}
