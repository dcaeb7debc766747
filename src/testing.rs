//! Test harness for constructing a gate with sensible defaults.
//!
//! Provides:
//! - [`StubExecutor`]: records resolved requests, returns canned responses
//! - [`StubBroadcastTool`]: a sensitive broadcast stand-in that records
//!   the transactions it was given
//! - [`StubWalletTool`]: the designated `wallet_address` origin
//! - [`SlowTool`]: a tool that sleeps, for deadline tests
//! - [`HarnessBuilder`] / [`Harness`]: a wired gate ready for dispatch
//!
//! # Usage
//!
//! ```rust,no_run
//! use palisade::testing::HarnessBuilder;
//!
//! # async fn example() {
//! let harness = HarnessBuilder::new().build();
//! // dispatch through harness.gate, assert via harness.executor etc.
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::CoreConfig;
use crate::error::{ExecutorError, ToolError};
use crate::executor::RequestExecutor;
use crate::gate::{GateConfig, ToolGate};
use crate::hooks::HookRegistry;
use crate::presets::{PresetCatalog, ResolvedRequest};
use crate::registers::GuardPolicy;
use crate::session::LaneManager;
use crate::tools::builtin::{
    PresetRequestTool, RegisterListTool, RegisterSetTool, TokenLookupTool,
};
use crate::tools::{Tool, ToolDeclaration, ToolInput, ToolOutput, ToolRegistry};

/// Well-formed lowercase address used across tests.
pub const TEST_WALLET: &str = "0x1111111111111111111111111111111111111111";

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only so test output stays
/// readable.
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A request executor that never touches the network.
pub struct StubExecutor {
    responses: Mutex<VecDeque<serde_json::Value>>,
    default_response: serde_json::Value,
    requests: Mutex<Vec<ResolvedRequest>>,
    calls: AtomicU32,
    should_fail: AtomicBool,
}

impl StubExecutor {
    /// A stub answering every request with the given value.
    pub fn new(default_response: serde_json::Value) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response,
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
        }
    }

    /// Queue a one-shot response ahead of the default.
    pub fn push_response(&self, response: serde_json::Value) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Toggle failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Number of execute calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request this stub has seen, in order.
    pub fn recorded_requests(&self) -> Vec<ResolvedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestExecutor for StubExecutor {
    async fn execute(&self, request: &ResolvedRequest) -> Result<serde_json::Value, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ExecutorError::Request("stub executor failure".into()));
        }
        let queued = self.responses.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Sensitive broadcast stand-in. Real deployments wire their own signer;
/// the contract is identical: the transaction payload only ever arrives via
/// `from_register`.
pub struct StubBroadcastTool {
    decl: ToolDeclaration,
    submitted: Mutex<Vec<serde_json::Value>>,
}

impl StubBroadcastTool {
    /// Tool name.
    pub const NAME: &'static str = "send_transaction";

    pub fn new() -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "Broadcast a prepared transaction. The payload must come from a register \
             via from_register; raw transaction fields are refused.",
        )
        .sensitive(["to", "data", "value", "gas", "sell_token", "buy_token", "sell_amount"])
        .with_register_param("transaction");
        Self {
            decl,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Transactions this stub has "broadcast".
    pub fn submitted(&self) -> Vec<serde_json::Value> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Default for StubBroadcastTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for StubBroadcastTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let tx = input
            .params
            .get("transaction")
            .cloned()
            .ok_or_else(|| ToolError::InvalidParameters("missing transaction".into()))?;
        self.submitted.lock().unwrap().push(tx);
        Ok(ToolOutput::text("transaction submitted"))
    }
}

/// The designated origin for the `wallet_address` register.
pub struct StubWalletTool {
    decl: ToolDeclaration,
    address: String,
}

impl StubWalletTool {
    /// Tool name, matching the standard guard policy.
    pub const NAME: &'static str = "wallet_lookup";

    pub fn new() -> Self {
        Self::with_address(TEST_WALLET)
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "Look up the session wallet's address. Use cache_as to store it.",
        )
        .with_cache_projection("address");
        Self {
            decl,
            address: address.into(),
        }
    }
}

impl Default for StubWalletTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for StubWalletTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, _input: ToolInput) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::success(
            "wallet address resolved",
            json!({"address": self.address}),
        ))
    }
}

/// A tool that sleeps longer than any sensible deadline.
pub struct SlowTool {
    decl: ToolDeclaration,
    delay: Duration,
}

impl SlowTool {
    pub fn new(delay: Duration) -> Self {
        Self {
            decl: ToolDeclaration::new("slow", "Sleeps. For deadline tests."),
            delay,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, _input: ToolInput) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::text("finally done"))
    }
}

/// The assembled components ready for use in tests.
pub struct Harness {
    /// The gate under test.
    pub gate: ToolGate,
    /// The stub executor behind `preset_request`.
    pub executor: Arc<StubExecutor>,
    /// The broadcast stand-in, for submission assertions.
    pub broadcast: Arc<StubBroadcastTool>,
    /// The lane manager, for session administration in tests.
    pub lanes: Arc<LaneManager>,
}

/// Builder wiring a gate with defaults: standard policy and catalog, the
/// builtin tools, the stub executor, wallet and broadcast stubs.
pub struct HarnessBuilder {
    policy: GuardPolicy,
    catalog: PresetCatalog,
    hooks: HookRegistry,
    gate_config: GateConfig,
    executor_response: serde_json::Value,
    extra_tools: Vec<Arc<dyn Tool>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            policy: GuardPolicy::standard(),
            catalog: PresetCatalog::standard(),
            hooks: HookRegistry::new(),
            gate_config: GateConfig::default(),
            executor_response: json!({
                "to": "0xdef1c0de00000000000000000000000000000000",
                "data": "0xdeadbeef",
                "value": "0",
                "gas": "210000"
            }),
            extra_tools: Vec::new(),
        }
    }

    /// Replace the guard policy.
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the preset catalog.
    pub fn with_catalog(mut self, catalog: PresetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the hook registry.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the gate timing config.
    pub fn with_gate_config(mut self, config: GateConfig) -> Self {
        self.gate_config = config;
        self
    }

    /// Set the stub executor's default response.
    pub fn with_executor_response(mut self, response: serde_json::Value) -> Self {
        self.executor_response = response;
        self
    }

    /// Register an additional tool.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    /// Wire everything together.
    pub fn build(self) -> Harness {
        init_test_logging();
        let executor = Arc::new(StubExecutor::new(self.executor_response));
        let broadcast = Arc::new(StubBroadcastTool::new());

        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(RegisterSetTool::new()))
            .expect("builtin registration");
        registry
            .register(Arc::new(RegisterListTool::new()))
            .expect("builtin registration");
        registry
            .register(Arc::new(TokenLookupTool::new()))
            .expect("builtin registration");
        registry
            .register(Arc::new(PresetRequestTool::new(
                Arc::clone(&executor) as Arc<dyn RequestExecutor>
            )))
            .expect("builtin registration");
        registry
            .register(Arc::new(StubWalletTool::new()))
            .expect("stub registration");
        registry
            .register(Arc::clone(&broadcast) as Arc<dyn Tool>)
            .expect("stub registration");
        for tool in self.extra_tools {
            registry.register(tool).expect("extra tool registration");
        }

        let hooks = Arc::new(self.hooks);
        let config = CoreConfig::default();
        let lanes = Arc::new(LaneManager::new(
            Arc::new(self.policy),
            config.validators(),
            Arc::clone(&hooks),
        ));

        let gate = ToolGate::new(
            Arc::new(registry),
            Arc::new(self.catalog),
            Arc::clone(&lanes),
            hooks,
            self.gate_config,
        );

        Harness {
            gate,
            executor,
            broadcast,
            lanes,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
