//! Error types for the gate pipeline and its collaborators.
//!
//! Every failure the core can produce is a typed, structured value that is
//! surfaced verbatim to the calling agent loop. The messages carry enough
//! detail for the agent to self-correct (the exact missing register names,
//! the tool that is allowed to write a guarded key). Nothing here is
//! retried internally; retry policy belongs to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::registers::ValueFormat;

/// Result type for gate dispatch.
pub type GateResult<T> = std::result::Result<T, GateError>;

/// Errors raised by register store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The register key itself is malformed.
    #[error("invalid register key '{key}': {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A validator rejected the value before it reached the store.
    #[error("invalid value for register '{key}' (expected {expected}): {reason}")]
    InvalidValueFormat {
        /// Destination register key.
        key: String,
        /// The format the guard policy declares for this key.
        expected: ValueFormat,
        /// Validator message.
        reason: String,
    },

    /// The guard policy forbids this origin from writing the key.
    ///
    /// Names the allowed origins so the agent can call the right tool
    /// instead of guessing values.
    #[error(
        "register '{key}' cannot be written by '{origin}'; \
         it is only written by: {}", allowed.join(", ")
    )]
    ForbiddenWrite {
        /// Destination register key.
        key: String,
        /// The origin that attempted the write.
        origin: String,
        /// Origins the policy accepts for this key.
        allowed: Vec<String>,
    },

    /// A read referenced a register that is not set in this session.
    #[error("register '{key}' is not set in this session")]
    NotFound {
        /// The key that was read.
        key: String,
    },

    /// A field projection referenced a path that does not exist in the
    /// register's JSON value (or the value is not JSON).
    #[error("register '{key}' has no field '{path}'")]
    FieldNotFound {
        /// The register key.
        key: String,
        /// The dot-path that failed to resolve.
        path: String,
    },
}

/// Errors raised while resolving a preset against a register snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresetError {
    /// No preset with this name exists in the catalog.
    #[error("unknown preset '{name}'")]
    Unknown {
        /// The requested preset name.
        name: String,
    },

    /// One or more required registers are absent. Lists every missing key,
    /// not just the first, to minimize agent retry round-trips.
    #[error(
        "preset '{preset}' cannot be resolved; missing registers: {}",
        missing.join(", ")
    )]
    RequirementUnmet {
        /// The preset being resolved.
        preset: String,
        /// All required registers absent from the session.
        missing: Vec<String>,
    },

    /// The template expanded to something that is not a valid request.
    #[error("preset '{preset}' template error: {reason}")]
    Template {
        /// The preset being resolved.
        preset: String,
        /// Why expansion failed.
        reason: String,
    },
}

/// Errors from the external request executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The request was refused before any network activity.
    #[error("request rejected: {reason}")]
    Rejected {
        /// Why the destination was refused.
        reason: String,
    },

    /// The request was sent but failed in transit.
    #[error("request failed: {0}")]
    Request(String),

    /// The destination answered with a non-success status.
    #[error("request returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// The response body could not be decoded as JSON.
    #[error("response decode failed: {0}")]
    Decode(String),
}

/// Errors from a tool's own execution (stage 4).
#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameters passed stage 1 but the tool still cannot use them.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The tool ran and failed.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The external executor failed underneath the tool.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Errors surfaced by the tool gate. This is the taxonomy the agent sees.
#[derive(Debug, Error)]
pub enum GateError {
    /// The invocation envelope itself is not well-formed.
    #[error("malformed invocation: {reason}")]
    MalformedInvocation {
        /// What is wrong with the envelope.
        reason: String,
    },

    /// The invocation named a tool that is not registered.
    #[error("unknown tool '{name}'")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// Raw parameters do not conform to the tool's declared schema.
    #[error("tool '{tool}' parameter schema violations: {}", violations.join("; "))]
    Schema {
        /// The tool being invoked.
        tool: String,
        /// Every violation found, not just the first.
        violations: Vec<String>,
    },

    /// A sensitive tool was invoked without a register source.
    #[error(
        "tool '{tool}' is sensitive and only reads its critical parameters \
         from a register; supply 'from_register' or 'preset'"
    )]
    ToolRequiresRegister {
        /// The sensitive tool.
        tool: String,
    },

    /// Both raw sensitive fields and a register reference were supplied.
    /// This is a hard failure, never a silent preference.
    #[error(
        "tool '{tool}' received both a register reference and raw sensitive \
         field(s) {}; remove the raw fields", fields.join(", ")
    )]
    ConflictingRawAndRegisterParams {
        /// The tool being invoked.
        tool: String,
        /// The raw guarded fields that were present.
        fields: Vec<String>,
    },

    /// Register store rejection (policy, validator, or absent key).
    #[error(transparent)]
    Register(#[from] RegisterError),

    /// Preset resolution failure.
    #[error(transparent)]
    Preset(#[from] PresetError),

    /// The tool itself failed during stage 4.
    #[error("tool '{tool}' failed: {source}")]
    Execution {
        /// The tool that failed.
        tool: String,
        /// The underlying tool error.
        source: ToolError,
    },

    /// Waiting for the session lane exceeded the configured deadline.
    /// Retryable: the lane is released cleanly, never poisoned.
    #[error("session '{session}' lane busy; timed out after {waited:?}")]
    LaneTimeout {
        /// The session whose lane was contended.
        session: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// Stage 4 exceeded the per-invocation deadline. Retryable.
    #[error("tool '{tool}' exceeded the invocation deadline of {deadline:?}")]
    Deadline {
        /// The tool that overran.
        tool: String,
        /// The configured deadline.
        deadline: Duration,
    },

    /// A before-execute hook vetoed the invocation.
    #[error("invocation aborted by hook '{hook}': {reason}")]
    HookAborted {
        /// The hook that aborted.
        hook: String,
        /// Its stated reason.
        reason: String,
    },
}

impl GateError {
    /// Whether the caller may safely retry the identical invocation.
    ///
    /// Only timeout-shaped failures qualify; everything else either needs a
    /// different invocation (policy, schema, missing registers) or already
    /// had a side effect attempt (`Execution`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LaneTimeout { .. } | Self::Deadline { .. })
    }

    /// Whether the agent can recover by calling something else first
    /// (e.g. the named origin tool, or the setters for missing registers).
    pub fn is_agent_correctable(&self) -> bool {
        matches!(
            self,
            Self::Register(RegisterError::ForbiddenWrite { .. })
                | Self::Register(RegisterError::NotFound { .. })
                | Self::Preset(PresetError::RequirementUnmet { .. })
                | Self::ToolRequiresRegister { .. }
                | Self::ConflictingRawAndRegisterParams { .. }
        )
    }
}

/// Errors raised while loading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {name}: {reason}")]
    Var {
        /// Variable name.
        name: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// A configuration file could not be read.
    #[error("failed to read {path}: {reason}")]
    File {
        /// File path.
        path: String,
        /// I/O failure.
        reason: String,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// File path.
        path: String,
        /// Parse failure.
        reason: String,
    },

    /// The configuration parsed but is internally inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is inconsistent.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_write_names_allowed_origins() {
        let err = RegisterError::ForbiddenWrite {
            key: "sell_token".into(),
            origin: "register_set".into(),
            allowed: vec!["token_lookup".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("sell_token"));
        assert!(msg.contains("token_lookup"));
    }

    #[test]
    fn requirement_unmet_lists_every_missing_key() {
        let err = PresetError::RequirementUnmet {
            preset: "swap_quote".into(),
            missing: vec!["sell_amount".into(), "wallet_address".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("sell_amount"));
        assert!(msg.contains("wallet_address"));
    }

    #[test]
    fn retryability_classification() {
        let lane = GateError::LaneTimeout {
            session: "s".into(),
            waited: Duration::from_secs(5),
        };
        let deadline = GateError::Deadline {
            tool: "t".into(),
            deadline: Duration::from_secs(30),
        };
        let unknown = GateError::UnknownTool { name: "x".into() };
        assert!(lane.is_retryable());
        assert!(deadline.is_retryable());
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn correctable_classification() {
        let err = GateError::ToolRequiresRegister { tool: "send".into() };
        assert!(err.is_agent_correctable());
        let err = GateError::UnknownTool { name: "x".into() };
        assert!(!err.is_agent_correctable());
    }
}
