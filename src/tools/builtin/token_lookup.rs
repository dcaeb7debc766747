//! Token lookup: symbol to contract address.
//!
//! A compiled-in table of known tokens per network, overridable from a TOML
//! file at startup. This tool is the designated origin for token address
//! registers: common token addresses enter the system through this table,
//! never through agent text.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ConfigError, ToolError};
use crate::tools::tool::{Tool, ToolDeclaration, ToolInput, ToolOutput, require_str};

/// One known token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    /// Contract address (`0xEeee…EEeE` for the native asset).
    pub address: String,
    /// Decimal places of the smallest unit.
    pub decimals: u8,
    /// Display name.
    pub name: String,
}

/// network -> SYMBOL -> token.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct TokenTable {
    networks: BTreeMap<String, BTreeMap<String, TokenInfo>>,
}

impl TokenTable {
    /// The compiled-in table: Base and Mainnet majors.
    pub fn builtin() -> Self {
        let toml_src = r#"
            [base.ETH]
            address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
            decimals = 18
            name = "Ethereum"

            [base.WETH]
            address = "0x4200000000000000000000000000000000000006"
            decimals = 18
            name = "Wrapped Ether"

            [base.USDC]
            address = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
            decimals = 6
            name = "USD Coin"

            [mainnet.ETH]
            address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
            decimals = 18
            name = "Ethereum"

            [mainnet.WETH]
            address = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
            decimals = 18
            name = "Wrapped Ether"

            [mainnet.USDC]
            address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
            decimals = 6
            name = "USD Coin"
        "#;
        toml::from_str(toml_src).expect("builtin token table is well-formed")
    }

    /// Load a table from a TOML file, falling back to the builtin table if
    /// the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "token table not found, using builtin");
            return Ok(Self::builtin());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let table: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let total: usize = table.networks.values().map(BTreeMap::len).sum();
        tracing::info!(
            tokens = total,
            networks = table.networks.len(),
            path = %path.display(),
            "loaded token table"
        );
        Ok(table)
    }

    /// Case-insensitive lookup, falling back to the default network when
    /// the requested one is unknown.
    pub fn lookup(&self, symbol: &str, network: &str) -> Option<&TokenInfo> {
        let symbol_upper = symbol.to_uppercase();
        self.networks
            .get(network)
            .or_else(|| self.networks.get(DEFAULT_NETWORK))
            .and_then(|tokens| tokens.get(&symbol_upper))
    }

    /// Sorted symbols available on a network.
    pub fn available(&self, network: &str) -> Vec<String> {
        self.networks
            .get(network)
            .or_else(|| self.networks.get(DEFAULT_NETWORK))
            .map(|tokens| tokens.keys().cloned().collect())
            .unwrap_or_default()
    }
}

const DEFAULT_NETWORK: &str = "base";

/// The lookup tool itself.
pub struct TokenLookupTool {
    decl: ToolDeclaration,
    table: TokenTable,
}

impl TokenLookupTool {
    /// Tool name, referenced by the standard guard policy as the only
    /// origin for `sell_token` / `buy_token`.
    pub const NAME: &'static str = "token_lookup";

    /// Build with the compiled-in table.
    pub fn new() -> Self {
        Self::with_table(TokenTable::builtin())
    }

    /// Build with an explicit table.
    pub fn with_table(table: TokenTable) -> Self {
        let decl = ToolDeclaration::new(
            Self::NAME,
            "Look up a token's contract address by symbol. Use cache_as to store the \
             address in a register (e.g. sell_token, buy_token) for use with presets.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Token symbol, e.g. 'ETH', 'USDC'. Case-insensitive."
                },
                "network": {
                    "type": "string",
                    "enum": ["base", "mainnet"],
                    "description": "Network to resolve on (default: base)"
                }
            },
            "required": ["symbol"]
        }))
        .with_cache_projection("address");
        Self { decl, table }
    }
}

impl Default for TokenLookupTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TokenLookupTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.decl
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let symbol = require_str(&input.params, "symbol")?;
        let network = input
            .params
            .get("network")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_NETWORK);

        match self.table.lookup(symbol, network) {
            Some(token) => {
                let result = json!({
                    "symbol": symbol.to_uppercase(),
                    "address": token.address,
                    "decimals": token.decimals,
                    "name": token.name,
                    "network": network,
                });
                Ok(ToolOutput::success(
                    format!(
                        "{} ({}) on {}: {} ({} decimals)",
                        token.name,
                        symbol.to_uppercase(),
                        network,
                        token.address,
                        token.decimals
                    ),
                    result,
                ))
            }
            None => Err(ToolError::Failed(format!(
                "token '{}' not found on {}; available: {}",
                symbol,
                network,
                self.table.available(network).join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_usdc() {
        let table = TokenTable::builtin();
        let token = table.lookup("USDC", "base").unwrap();
        assert_eq!(token.address, "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");
        assert_eq!(token.decimals, 6);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = TokenTable::builtin();
        let a = table.lookup("usdc", "base").unwrap();
        let b = table.lookup("Usdc", "base").unwrap();
        assert_eq!(a.address, b.address);
    }

    #[test]
    fn eth_native_asset_sentinel() {
        let table = TokenTable::builtin();
        let token = table.lookup("ETH", "mainnet").unwrap();
        assert_eq!(token.address, "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
    }

    #[test]
    fn unknown_network_falls_back_to_default() {
        let table = TokenTable::builtin();
        assert!(table.lookup("USDC", "no-such-network").is_some());
    }

    #[test]
    fn unknown_symbol_is_none() {
        let table = TokenTable::builtin();
        assert!(table.lookup("UNKNOWN_XYZ", "base").is_none());
    }

    #[tokio::test]
    async fn execute_returns_address_and_decimals() {
        let tool = TokenLookupTool::new();
        let out = tool
            .execute(ToolInput::params(json!({"symbol": "WETH"})))
            .await
            .unwrap();
        assert_eq!(
            out.result["address"],
            json!("0x4200000000000000000000000000000000000006")
        );
        assert_eq!(out.result["decimals"], json!(18));
    }

    #[tokio::test]
    async fn execute_unknown_token_lists_available() {
        let tool = TokenLookupTool::new();
        let err = tool
            .execute(ToolInput::params(json!({"symbol": "NOPE"})))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NOPE"));
        assert!(msg.contains("USDC"));
    }

    #[test]
    fn load_missing_file_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let table = TokenTable::load(&dir.path().join("tokens.toml")).unwrap();
        assert!(table.lookup("ETH", "base").is_some());
    }

    #[test]
    fn load_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.toml");
        std::fs::write(
            &path,
            r#"
            [base.FOO]
            address = "0x1111111111111111111111111111111111111111"
            decimals = 9
            name = "Foo Token"
            "#,
        )
        .unwrap();
        let table = TokenTable::load(&path).unwrap();
        assert!(table.lookup("FOO", "base").is_some());
        assert!(table.lookup("USDC", "base").is_none());
    }
}
