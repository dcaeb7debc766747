//! Palisade: a register-gated tool execution core.
//!
//! Palisade sits between an untrusted LLM planner and the side-effecting
//! tools it may invoke, and makes one guarantee: the agent can choose
//! *which* tool to call and *which* previously-validated value to
//! reference, but it can never type, compose, or edit the raw bytes of a
//! sensitive parameter (wallet addresses, token contracts, amounts,
//! transaction payloads).
//!
//! The pieces:
//!
//! - [`registers`]: session-scoped store, the only channel sensitive
//!   values travel through; every write is validator- and policy-checked
//! - [`presets`]: declared request templates resolved purely from
//!   register contents
//! - [`gate`]: the five-stage dispatch pipeline every invocation passes
//!   through
//! - [`session`]: per-conversation lanes serializing invocations and
//!   isolating register stores
//! - [`tools`]: tool declarations, registry, and the builtin register
//!   workflow tools
//! - [`executor`]: the seam outbound requests leave through
//! - [`hooks`]: observers around execution and session lifecycle
//! - [`config`]: env settings and TOML tables for policy, presets, and
//!   tokens

pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod hooks;
pub mod presets;
pub mod registers;
pub mod session;
pub mod testing;
pub mod tools;

pub use error::{ConfigError, ExecutorError, GateError, PresetError, RegisterError, ToolError};
pub use gate::{GateConfig, GateResponse, ToolGate, ToolInvocation};
pub use registers::{GuardPolicy, RegisterStore, RegisterValue};
pub use session::LaneManager;
