//! Pure value-shape validators, keyed by declared format.
//!
//! Validators run before `RegisterStore::set` commits; a rejection leaves
//! the store unchanged. They are stateless and total: malformed input is a
//! reason string, never a panic.

use serde::{Deserialize, Serialize};

use crate::registers::value::RegisterValue;

/// Maximum register key length. Keys are agent-visible identifiers, not
/// payloads; anything longer is a mistake or an injection attempt.
pub const MAX_KEY_LEN: usize = 64;

/// Default ceiling on amount digits: uint256 has at most 78 decimal digits.
pub const DEFAULT_MAX_AMOUNT_DIGITS: usize = 78;

/// The value shape a register is declared to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// `0x` + 40 hex chars.
    Address,
    /// Base-10 integer string in smallest units.
    Amount,
    /// Any well-formed JSON value.
    Json,
}

impl std::fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Address => "address",
            Self::Amount => "amount",
            Self::Json => "json",
        };
        write!(f, "{}", s)
    }
}

/// How strictly addresses are validated.
///
/// Mixed-case hex asserts an EIP-55 checksum. Verifying one needs keccak-256,
/// which this core does not carry, so `Strict` refuses the unverifiable
/// claim outright while `Lenient` accepts any casing. Deployment-configurable
/// via `PALISADE_ADDRESS_STRICTNESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressStrictness {
    /// Any `0x` + 40 hex chars, any casing.
    Lenient,
    /// Additionally reject mixed-case strings (unverifiable checksum claim).
    #[default]
    Strict,
}

/// Validator settings, resolved once at startup and shared read-only.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Address validation strictness.
    pub address_strictness: AddressStrictness,
    /// Maximum digits accepted in an amount string.
    pub max_amount_digits: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            address_strictness: AddressStrictness::default(),
            max_amount_digits: DEFAULT_MAX_AMOUNT_DIGITS,
        }
    }
}

/// Check a register key: non-empty, bounded, alphanumeric + underscore.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key is empty".to_string());
    }
    if key.len() > MAX_KEY_LEN {
        return Err(format!("key exceeds {} characters", MAX_KEY_LEN));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("key may only contain [A-Za-z0-9_]".to_string());
    }
    Ok(())
}

/// Check a value against its declared format.
pub fn validate_value(
    format: ValueFormat,
    value: &RegisterValue,
    config: &ValidatorConfig,
) -> Result<(), String> {
    match (format, value) {
        (ValueFormat::Address, RegisterValue::Text(s)) => {
            validate_address(s, config.address_strictness)
        }
        (ValueFormat::Amount, RegisterValue::Amount(s)) => {
            validate_amount(s, config.max_amount_digits)
        }
        // Amounts arriving as plain text (e.g. through a JSON coercion that
        // picked Text) are still held to the amount rules.
        (ValueFormat::Amount, RegisterValue::Text(s)) => {
            validate_amount(s, config.max_amount_digits)
        }
        (ValueFormat::Json, RegisterValue::Json(_)) => Ok(()),
        (expected, got) => Err(format!(
            "value variant does not match declared format {} (got {})",
            expected,
            variant_name(got)
        )),
    }
}

fn variant_name(value: &RegisterValue) -> &'static str {
    match value {
        RegisterValue::Text(_) => "text",
        RegisterValue::Amount(_) => "amount",
        RegisterValue::Json(_) => "json",
    }
}

/// Validate an address: `0x` prefix plus exactly 20 hex-encoded bytes.
pub fn validate_address(s: &str, strictness: AddressStrictness) -> Result<(), String> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| "missing 0x prefix".to_string())?;
    if body.len() != 40 {
        return Err(format!("expected 40 hex chars after 0x, got {}", body.len()));
    }
    if hex::decode(body).is_err() {
        return Err("contains non-hex characters".to_string());
    }
    if strictness == AddressStrictness::Strict {
        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(
                "mixed-case address claims a checksum this deployment does not verify; \
                 supply the address all-lowercase"
                    .to_string(),
            );
        }
    }
    Ok(())
}

/// Validate an amount: non-empty, digits only, bounded length.
///
/// Signs, decimal points, and exponents are all rejected by the digits-only
/// rule, which closes off scientific-notation and overflow injection.
pub fn validate_amount(s: &str, max_digits: usize) -> Result<(), String> {
    if s.is_empty() {
        return Err("amount is empty".to_string());
    }
    if s.len() > max_digits {
        return Err(format!("amount exceeds {} digits", max_digits));
    }
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err("amount must be a base-10 integer string".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";

    #[test]
    fn key_charset() {
        assert!(validate_key("sell_token").is_ok());
        assert!(validate_key("quote2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("sell-token").is_err());
        assert!(validate_key("sell token").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn address_well_formed() {
        assert!(validate_address(USDC, AddressStrictness::Lenient).is_ok());
        assert!(validate_address(USDC, AddressStrictness::Strict).is_ok());
    }

    #[test]
    fn address_missing_prefix() {
        let err = validate_address(&USDC[2..], AddressStrictness::Lenient).unwrap_err();
        assert!(err.contains("0x prefix"));
    }

    #[test]
    fn address_wrong_length() {
        assert!(validate_address("0x1234", AddressStrictness::Lenient).is_err());
    }

    #[test]
    fn address_non_hex() {
        assert!(
            validate_address(
                "0xzz3589fcd6edb6e08f4c7c32d4f71b54bda02913",
                AddressStrictness::Lenient
            )
            .is_err()
        );
    }

    #[test]
    fn strict_rejects_mixed_case() {
        let mixed = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
        assert!(validate_address(mixed, AddressStrictness::Lenient).is_ok());
        assert!(validate_address(mixed, AddressStrictness::Strict).is_err());
    }

    #[test]
    fn strict_accepts_uniform_case() {
        let upper = "0x833589FCD6EDB6E08F4C7C32D4F71B54BDA02913";
        assert!(validate_address(upper, AddressStrictness::Strict).is_ok());
    }

    #[test]
    fn amount_accepts_integer_strings() {
        assert!(validate_amount("0", 78).is_ok());
        assert!(validate_amount("1000000000000000000", 78).is_ok());
    }

    #[test]
    fn amount_rejects_signs_decimals_exponents() {
        assert!(validate_amount("-5", 78).is_err());
        assert!(validate_amount("+5", 78).is_err());
        assert!(validate_amount("1.5", 78).is_err());
        assert!(validate_amount("1e18", 78).is_err());
        assert!(validate_amount("", 78).is_err());
    }

    #[test]
    fn amount_digit_ceiling() {
        assert!(validate_amount(&"9".repeat(78), 78).is_ok());
        assert!(validate_amount(&"9".repeat(79), 78).is_err());
    }

    #[test]
    fn value_format_mismatch_is_rejected() {
        let cfg = ValidatorConfig::default();
        let err = validate_value(
            ValueFormat::Address,
            &RegisterValue::Json(serde_json::json!({})),
            &cfg,
        )
        .unwrap_err();
        assert!(err.contains("address"));
    }
}
