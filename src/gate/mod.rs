//! The tool gate: every invocation passes through here.
//!
//! Stages, in order, each a potential failure point:
//!
//! 1. **Schema check**: parameters conform to the tool's declared shape;
//!    unknown fields rejected.
//! 2. **Sensitivity check**: sensitive tools must read critical input from
//!    a register or preset; raw guarded fields are refused.
//! 3. **Resolution**: `from_register` values are fetched (and optionally
//!    field-projected) from the session store; `preset` invocations are
//!    resolved purely from register contents.
//! 4. **Execution**: the only stage with real-world side effects, bounded
//!    by a per-invocation deadline.
//! 5. **Caching**: on success only, the result is written back under
//!    `cache_as`, subject to the guard policy.
//!
//! No register mutation happens before stage 4 succeeds, so the store never
//! reflects an in-flight or failed side effect.

mod invocation;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{GateError, GateResult, RegisterError, ToolError};
use crate::hooks::{GateEvent, HookRegistry};
use crate::presets::{PresetCatalog, resolve};
use crate::session::{LaneManager, Session};
use crate::tools::{Tool, ToolDeclaration, ToolInput, ToolRegistry};

pub use invocation::{RESERVED_PARAMS, RegisterRef, ReservedParams, ToolInvocation};

/// Gate timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// How long a dispatch waits for its session lane.
    pub lane_timeout: Duration,
    /// Hard deadline on stage 4.
    pub invocation_deadline: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lane_timeout: Duration::from_secs(30),
            invocation_deadline: Duration::from_secs(60),
        }
    }
}

/// What a dispatch returns to the agent: only what the tool disclosed,
/// plus the register name a cached result lives under.
#[derive(Debug, Clone)]
pub struct GateResponse {
    /// The tool that ran.
    pub tool: String,
    /// The tool's human-readable summary.
    pub summary: String,
    /// The structured result, only if the tool chose to disclose it.
    pub result: Option<Value>,
    /// Register written by the caching directive.
    pub cached_as: Option<String>,
}

/// The dispatch point for every tool invocation.
pub struct ToolGate {
    registry: Arc<ToolRegistry>,
    catalog: Arc<PresetCatalog>,
    lanes: Arc<LaneManager>,
    hooks: Arc<HookRegistry>,
    config: GateConfig,
}

impl ToolGate {
    /// Assemble a gate from its immutable collaborators.
    pub fn new(
        registry: Arc<ToolRegistry>,
        catalog: Arc<PresetCatalog>,
        lanes: Arc<LaneManager>,
        hooks: Arc<HookRegistry>,
        config: GateConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            lanes,
            hooks,
            config,
        }
    }

    /// The lane manager, for session administration (explicit end, idle
    /// pruning) by the embedding application.
    pub fn lanes(&self) -> &Arc<LaneManager> {
        &self.lanes
    }

    /// Dispatch one invocation for one conversation.
    ///
    /// Invocations for the same session are strictly serialized: N's
    /// effects, including register writes, are fully visible before N+1
    /// begins stage 1.
    pub async fn dispatch(
        &self,
        session_key: &str,
        invocation: ToolInvocation,
    ) -> GateResult<GateResponse> {
        let tool = Arc::clone(self.registry.get(&invocation.tool).ok_or_else(|| {
            GateError::UnknownTool {
                name: invocation.tool.clone(),
            }
        })?);

        if tool.declaration().cross_session {
            let _global = self.lanes.acquire_global(self.config.lane_timeout).await?;
            return self.run_cross_session(tool.as_ref(), &invocation).await;
        }

        let mut session = self
            .lanes
            .acquire(session_key, self.config.lane_timeout)
            .await?;

        let result = self
            .run_stages(tool.as_ref(), &invocation, &mut session)
            .await;
        session.touch();
        result
    }

    /// Stages 1–5 under an exclusively held session.
    async fn run_stages(
        &self,
        tool: &dyn Tool,
        invocation: &ToolInvocation,
        session: &mut Session,
    ) -> GateResult<GateResponse> {
        let decl = tool.declaration();
        let reserved = invocation.reserved()?;
        let mut params = invocation.stripped_params();

        // Stage 1: schema check.
        self.check_schema(decl, &params)?;

        // Stage 2: sensitivity check.
        self.check_sensitivity(decl, &params, &reserved)?;

        // Stage 3: resolution.
        let mut input = ToolInput {
            params: Value::Object(Map::new()),
            request: None,
            registers: None,
        };

        if let Some(reference) = &reserved.from_register {
            let register_param = decl.register_param.as_deref().ok_or_else(|| {
                GateError::Schema {
                    tool: decl.name.clone(),
                    violations: vec![format!(
                        "tool '{}' does not accept 'from_register'",
                        decl.name
                    )],
                }
            })?;
            let value = fetch_register(session, reference)?;
            params.insert(register_param.to_string(), value);
        }

        if let Some(preset_name) = &reserved.preset {
            if !decl.requires_preset {
                return Err(GateError::Schema {
                    tool: decl.name.clone(),
                    violations: vec![format!("tool '{}' does not accept 'preset'", decl.name)],
                });
            }
            input.request = Some(resolve(&self.catalog, preset_name, &session.registers)?);
        }

        if decl.reads_listing {
            input.registers = Some(session.registers.summaries());
        }
        input.params = Value::Object(params);

        // Hooks may veto before any side effect happens.
        self.hooks
            .check(&GateEvent::BeforeExecute {
                session: session.key.clone(),
                tool: decl.name.clone(),
            })
            .await?;

        // Stage 4: execution, deadline-bounded. The only stage with
        // real-world side effects.
        tracing::debug!(tool = %decl.name, session = %session.key, "executing tool");
        let output = match tokio::time::timeout(
            self.config.invocation_deadline,
            tool.execute(input),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(GateError::Execution {
                    tool: decl.name.clone(),
                    source,
                });
            }
            Err(_) => {
                tracing::warn!(tool = %decl.name, "invocation deadline exceeded");
                return Err(GateError::Deadline {
                    tool: decl.name.clone(),
                    deadline: self.config.invocation_deadline,
                });
            }
        };

        // Stage 5: caching. Runs only after successful execution.
        let mut cached_as = None;
        if let Some(cache_key) = &reserved.cache_as {
            let origin = match &reserved.preset {
                Some(preset_name) => format!("preset:{}", preset_name),
                None => decl.name.clone(),
            };
            let value = self.cache_value(decl, &reserved, &output.result)?;
            session.registers.set_json(cache_key, &value, &origin)?;
            cached_as = Some(cache_key.clone());
            tracing::info!(
                tool = %decl.name,
                register = %cache_key,
                origin = %origin,
                "result cached"
            );
        }

        self.hooks
            .notify(&GateEvent::AfterExecute {
                session: session.key.clone(),
                tool: decl.name.clone(),
                cached_as: cached_as.clone(),
            })
            .await;

        Ok(GateResponse {
            tool: decl.name.clone(),
            summary: output.summary,
            result: output.disclose_result.then_some(output.result),
            cached_as,
        })
    }

    /// Cross-session administrative tools: global lane, no register access.
    async fn run_cross_session(
        &self,
        tool: &dyn Tool,
        invocation: &ToolInvocation,
    ) -> GateResult<GateResponse> {
        let decl = tool.declaration();
        let reserved = invocation.reserved()?;
        if reserved.cache_as.is_some()
            || reserved.from_register.is_some()
            || reserved.preset.is_some()
        {
            return Err(GateError::Schema {
                tool: decl.name.clone(),
                violations: vec![
                    "cross-session tools do not take register or preset directives".to_string(),
                ],
            });
        }
        let params = invocation.stripped_params();
        self.check_schema(decl, &params)?;

        let output = tokio::time::timeout(
            self.config.invocation_deadline,
            tool.execute(ToolInput::params(Value::Object(params))),
        )
        .await
        .map_err(|_| GateError::Deadline {
            tool: decl.name.clone(),
            deadline: self.config.invocation_deadline,
        })?
        .map_err(|source| GateError::Execution {
            tool: decl.name.clone(),
            source,
        })?;

        Ok(GateResponse {
            tool: decl.name.clone(),
            summary: output.summary,
            result: output.disclose_result.then_some(output.result),
            cached_as: None,
        })
    }

    /// Stage 1: unknown fields, required fields, primitive types, enums.
    ///
    /// Guarded fields of a sensitive tool are excluded here so stage 2 can
    /// report them as the policy violation they are, rather than a generic
    /// unknown-field complaint.
    fn check_schema(
        &self,
        decl: &ToolDeclaration,
        params: &Map<String, Value>,
    ) -> GateResult<()> {
        let mut violations = Vec::new();

        let properties = decl
            .parameters
            .get("properties")
            .and_then(|p| p.as_object());

        for (key, value) in params {
            if decl.is_sensitive() && decl.guarded_fields.iter().any(|f| f == key) {
                continue;
            }
            let Some(property) = properties.and_then(|p| p.get(key)) else {
                violations.push(format!("unexpected field '{}'", key));
                continue;
            };
            if let Some(expected) = property.get("type").and_then(|t| t.as_str())
                && !type_matches(expected, value)
            {
                violations.push(format!(
                    "field '{}' must be of type {}",
                    key, expected
                ));
            }
            if let Some(allowed) = property.get("enum").and_then(|e| e.as_array())
                && !allowed.contains(value)
            {
                violations.push(format!("field '{}' must be one of {:?}", key, allowed));
            }
        }

        if let Some(required) = decl
            .parameters
            .get("required")
            .and_then(|r| r.as_array())
        {
            for req in required {
                if let Some(name) = req.as_str()
                    && !params.contains_key(name)
                {
                    // A register binding satisfies its parameter later, in
                    // stage 3.
                    if decl.register_param.as_deref() == Some(name) {
                        continue;
                    }
                    violations.push(format!("missing required field '{}'", name));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(GateError::Schema {
                tool: decl.name.clone(),
                violations,
            })
        }
    }

    /// Stage 2: sensitive tools read critical input only from registers.
    fn check_sensitivity(
        &self,
        decl: &ToolDeclaration,
        params: &Map<String, Value>,
        reserved: &ReservedParams,
    ) -> GateResult<()> {
        let raw_guarded: Vec<String> = decl
            .guarded_fields
            .iter()
            .filter(|f| params.contains_key(f.as_str()))
            .cloned()
            .collect();

        if decl.is_sensitive() {
            let has_source = reserved.from_register.is_some() || reserved.preset.is_some();
            if !raw_guarded.is_empty() {
                if has_source {
                    return Err(GateError::ConflictingRawAndRegisterParams {
                        tool: decl.name.clone(),
                        fields: raw_guarded,
                    });
                }
                return Err(GateError::ToolRequiresRegister {
                    tool: decl.name.clone(),
                });
            }
            if !has_source {
                return Err(GateError::ToolRequiresRegister {
                    tool: decl.name.clone(),
                });
            }
        }

        if decl.requires_preset && reserved.preset.is_none() {
            return Err(GateError::ToolRequiresRegister {
                tool: decl.name.clone(),
            });
        }

        Ok(())
    }

    /// Pick the value a caching directive stores: the preset's declared
    /// result filter, else the tool's cache projection, else the whole
    /// result.
    fn cache_value(
        &self,
        decl: &ToolDeclaration,
        reserved: &ReservedParams,
        result: &Value,
    ) -> GateResult<Value> {
        let filter = match &reserved.preset {
            Some(preset_name) => {
                let def = self
                    .catalog
                    .get(preset_name)
                    .expect("preset resolved in stage 3");
                if let Some(expected) = &def.result_register
                    && reserved.cache_as.as_deref() != Some(expected.as_str())
                {
                    tracing::warn!(
                        preset = %preset_name,
                        declared = %expected,
                        requested = reserved.cache_as.as_deref().unwrap_or(""),
                        "cache_as differs from the preset's declared result register"
                    );
                }
                def.result_filter.clone()
            }
            None => decl.cache_projection.clone(),
        };

        match filter {
            None => Ok(result.clone()),
            Some(path) => {
                let mut current = result;
                for segment in path.split('.') {
                    current = current.get(segment).ok_or_else(|| GateError::Execution {
                        tool: decl.name.clone(),
                        source: ToolError::Failed(format!(
                            "result has no field '{}' to cache",
                            path
                        )),
                    })?;
                }
                Ok(current.clone())
            }
        }
    }
}

/// Fetch a register value, applying an optional dot-path projection.
fn fetch_register(session: &Session, reference: &str) -> Result<Value, RegisterError> {
    let rref = RegisterRef::parse(reference);
    match &rref.path {
        None => session
            .registers
            .get(&rref.key)
            .map(|entry| entry.value.to_json())
            .ok_or(RegisterError::NotFound { key: rref.key }),
        Some(path) => {
            if !session.registers.contains(&rref.key) {
                return Err(RegisterError::NotFound { key: rref.key });
            }
            session
                .registers
                .get_field(&rref.key, path)
                .cloned()
                .ok_or_else(|| RegisterError::FieldNotFound {
                    key: rref.key.clone(),
                    path: path.clone(),
                })
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_matching() {
        assert!(type_matches("string", &serde_json::json!("x")));
        assert!(!type_matches("string", &serde_json::json!(1)));
        assert!(type_matches("integer", &serde_json::json!(1)));
        assert!(!type_matches("integer", &serde_json::json!(1.5)));
        assert!(type_matches("number", &serde_json::json!(1.5)));
        assert!(type_matches("object", &serde_json::json!({})));
        assert!(type_matches("array", &serde_json::json!([])));
    }
}
