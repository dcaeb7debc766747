//! The outbound request seam.
//!
//! The core never opens sockets of its own; it hands fully-resolved,
//! register-derived requests to a [`RequestExecutor`]. Integrators supply
//! their own implementation or use the shipped [`HttpExecutor`].

mod http;

use async_trait::async_trait;

use crate::error::ExecutorError;
use crate::presets::ResolvedRequest;

pub use http::HttpExecutor;

/// Executes a resolved request and returns its JSON result.
///
/// The core guarantees the request's parameters were sourced from registers,
/// not from agent text; the executor's only job is transport.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Perform the request.
    async fn execute(&self, request: &ResolvedRequest) -> Result<serde_json::Value, ExecutorError>;
}
