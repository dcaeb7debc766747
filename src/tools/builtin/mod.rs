//! Built-in tools.
//!
//! These cover the register workflow itself: the generic agent-settable
//! write path, a value-free listing, the token lookup that is the sole
//! origin for token address registers, and the preset-driven request tool.
//! Side-effecting integrations (wallets, broadcast) are supplied by the
//! embedding application through their own `Tool` implementations.

mod preset_request;
mod registers;
mod token_lookup;

pub use preset_request::PresetRequestTool;
pub use registers::{RegisterListTool, RegisterSetTool};
pub use token_lookup::{TokenInfo, TokenLookupTool, TokenTable};
