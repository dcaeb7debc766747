//! Gate and session lifecycle hooks.
//!
//! An ordered list of observers invoked around tool execution and at
//! session boundaries. Before-execute hooks may abort the invocation;
//! everything else is observe-only. Hooks are deliberately decoupled from
//! register store internals: they see names and outcomes, not raw values.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GateError;

/// Lifecycle and pipeline events hooks can observe.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A session was created (first tool call for a conversation).
    SessionStart {
        /// Session key.
        session: String,
    },
    /// A session ended (explicit end or idle prune); registers discarded.
    SessionEnd {
        /// Session key.
        session: String,
    },
    /// About to enter stage 4 for a tool. Abortable.
    BeforeExecute {
        /// Session key.
        session: String,
        /// The tool being invoked.
        tool: String,
    },
    /// An invocation completed all stages.
    AfterExecute {
        /// Session key.
        session: String,
        /// The tool that ran.
        tool: String,
        /// Register written by the caching directive, if any.
        cached_as: Option<String>,
    },
}

/// What a hook wants done with the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Proceed.
    Continue,
    /// Abort before stage 4. Only honored for `BeforeExecute`.
    Abort {
        /// Reason surfaced to the agent.
        reason: String,
    },
}

/// An observer around gate stages and session lifecycle.
#[async_trait]
pub trait GateHook: Send + Sync {
    /// Name, used in abort errors and logs.
    fn name(&self) -> &str;

    /// Handle an event.
    async fn on_event(&self, event: &GateEvent) -> HookDecision;
}

/// Ordered hook list.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn GateHook>>,
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; invocation order is registration order.
    pub fn register(&mut self, hook: Arc<dyn GateHook>) {
        self.hooks.push(hook);
    }

    /// Whether any hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run an abortable event; the first abort wins.
    pub async fn check(&self, event: &GateEvent) -> Result<(), GateError> {
        for hook in &self.hooks {
            if let HookDecision::Abort { reason } = hook.on_event(event).await {
                tracing::info!(hook = hook.name(), %reason, "hook aborted invocation");
                return Err(GateError::HookAborted {
                    hook: hook.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Run an observe-only event. Abort decisions are logged and ignored.
    pub async fn notify(&self, event: &GateEvent) {
        for hook in &self.hooks {
            if let HookDecision::Abort { reason } = hook.on_event(event).await {
                tracing::warn!(
                    hook = hook.name(),
                    %reason,
                    "hook tried to abort an observe-only event; ignored"
                );
            }
        }
    }
}
