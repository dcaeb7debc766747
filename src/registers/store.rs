//! The session-scoped register store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::RegisterError;
use crate::registers::policy::GuardPolicy;
use crate::registers::validators::{self, ValidatorConfig};
use crate::registers::value::{RegisterEntry, RegisterValue};

/// Session-private mapping from key to validated value with write-origin
/// metadata. Entries keep first-write order for audit listings; last write
/// wins on overwrite.
///
/// All operations are total: "key not found" and "policy rejected" are
/// ordinary result values. A rejected write never mutates the store.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    entries: Vec<RegisterEntry>,
    policy: Arc<GuardPolicy>,
    validators: ValidatorConfig,
}

/// What a listing discloses about a register: everything except the value.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSummary {
    /// Register key.
    pub key: String,
    /// The origin that wrote it.
    pub origin_tool: String,
    /// When the write committed.
    pub written_at: chrono::DateTime<Utc>,
}

impl RegisterStore {
    /// Create an empty store governed by the given policy.
    pub fn new(policy: Arc<GuardPolicy>, validators: ValidatorConfig) -> Self {
        Self {
            entries: Vec::new(),
            policy,
            validators,
        }
    }

    /// Validate and commit a write.
    ///
    /// Checks run in order (key charset, guard policy, value format) and
    /// the first failure returns with the store untouched.
    pub fn set(
        &mut self,
        key: &str,
        value: RegisterValue,
        origin_tool: &str,
    ) -> Result<(), RegisterError> {
        validators::validate_key(key).map_err(|reason| RegisterError::InvalidKey {
            key: key.to_string(),
            reason,
        })?;

        self.policy.check_write(key, origin_tool)?;

        let format = self.policy.format(key);
        validators::validate_value(format, &value, &self.validators).map_err(|reason| {
            RegisterError::InvalidValueFormat {
                key: key.to_string(),
                expected: format,
                reason,
            }
        })?;

        let entry = RegisterEntry {
            key: key.to_string(),
            value,
            origin_tool: origin_tool.to_string(),
            written_at: Utc::now(),
        };

        tracing::debug!(register = key, origin = origin_tool, "register write committed");

        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    /// Coerce a raw JSON value to the key's declared format, then commit.
    ///
    /// This is the write path for caching directives, where the value
    /// arrives as a tool result rather than a typed register value.
    pub fn set_json(
        &mut self,
        key: &str,
        value: &serde_json::Value,
        origin_tool: &str,
    ) -> Result<(), RegisterError> {
        let format = self.policy.format(key);
        let coerced = RegisterValue::from_json(format, value).map_err(|reason| {
            RegisterError::InvalidValueFormat {
                key: key.to_string(),
                expected: format,
                reason,
            }
        })?;
        self.set(key, coerced, origin_tool)
    }

    /// Current entry for a key, or absent.
    pub fn get(&self, key: &str) -> Option<&RegisterEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// A nested field of a JSON-valued entry, addressed by dot-path.
    ///
    /// Used when a tool needs one attribute of a cached structured result,
    /// e.g. the `to` field of a swap quote.
    pub fn get_field(&self, key: &str, field_path: &str) -> Option<&serde_json::Value> {
        let mut current = self.get(key)?.value.as_json()?;
        for segment in field_path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Whether a key is set.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Entries in first-write (audit) order.
    pub fn entries(&self) -> impl Iterator<Item = &RegisterEntry> {
        self.entries.iter()
    }

    /// Value-free summaries in audit order, for listing tools.
    pub fn summaries(&self) -> Vec<RegisterSummary> {
        self.entries
            .iter()
            .map(|e| RegisterSummary {
                key: e.key.clone(),
                origin_tool: e.origin_tool.clone(),
                written_at: e.written_at,
            })
            .collect()
    }

    /// Number of set registers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry. Used at session teardown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";

    fn store() -> RegisterStore {
        RegisterStore::new(Arc::new(GuardPolicy::standard()), ValidatorConfig::default())
    }

    #[test]
    fn round_trip() {
        let mut s = store();
        s.set("sell_token", RegisterValue::Text(USDC.into()), "token_lookup")
            .unwrap();
        let entry = s.get("sell_token").unwrap();
        assert_eq!(entry.value, RegisterValue::Text(USDC.into()));
        assert_eq!(entry.origin_tool, "token_lookup");
    }

    #[test]
    fn last_write_wins_and_keeps_audit_position() {
        let mut s = store();
        s.set("sell_amount", RegisterValue::Amount("1".into()), "register_set")
            .unwrap();
        s.set("scratch", RegisterValue::Json(serde_json::json!(1)), "register_set")
            .unwrap();
        s.set("sell_amount", RegisterValue::Amount("2".into()), "register_set")
            .unwrap();

        let keys: Vec<_> = s.entries().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["sell_amount", "scratch"]);
        assert_eq!(
            s.get("sell_amount").unwrap().value,
            RegisterValue::Amount("2".into())
        );
    }

    #[test]
    fn rejected_policy_write_leaves_store_unchanged() {
        let mut s = store();
        let err = s
            .set("sell_token", RegisterValue::Text(USDC.into()), "register_set")
            .unwrap_err();
        assert!(matches!(err, RegisterError::ForbiddenWrite { .. }));
        assert!(s.is_empty());
    }

    #[test]
    fn rejected_validator_write_leaves_store_unchanged() {
        let mut s = store();
        let err = s
            .set(
                "sell_amount",
                RegisterValue::Amount("1.5".into()),
                "register_set",
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValueFormat { .. }));
        assert!(s.is_empty());
    }

    #[test]
    fn invalid_key_rejected_before_policy() {
        let mut s = store();
        let err = s
            .set("bad key!", RegisterValue::Json(serde_json::json!(1)), "x")
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidKey { .. }));
    }

    #[test]
    fn get_field_projects_json_entries() {
        let mut s = store();
        s.set(
            "swap_quote",
            RegisterValue::Json(serde_json::json!({
                "to": "0xdef1",
                "tx": {"gas": "21000"}
            })),
            "preset:swap_quote",
        )
        .unwrap();

        assert_eq!(
            s.get_field("swap_quote", "to").unwrap(),
            &serde_json::json!("0xdef1")
        );
        assert_eq!(
            s.get_field("swap_quote", "tx.gas").unwrap(),
            &serde_json::json!("21000")
        );
        assert!(s.get_field("swap_quote", "missing").is_none());
    }

    #[test]
    fn get_field_on_text_entry_is_none() {
        let mut s = store();
        s.set("sell_token", RegisterValue::Text(USDC.into()), "token_lookup")
            .unwrap();
        assert!(s.get_field("sell_token", "anything").is_none());
    }

    #[test]
    fn set_json_coerces_per_declared_format() {
        let mut s = store();
        s.set_json("sell_amount", &serde_json::json!("1000000"), "register_set")
            .unwrap();
        assert_eq!(
            s.get("sell_amount").unwrap().value,
            RegisterValue::Amount("1000000".into())
        );

        // A numeric JSON amount is a format error, not a silent coercion.
        let err = s
            .set_json("sell_amount", &serde_json::json!(1000000), "register_set")
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValueFormat { .. }));
    }

    #[test]
    fn summaries_never_contain_values() {
        let mut s = store();
        s.set("sell_token", RegisterValue::Text(USDC.into()), "token_lookup")
            .unwrap();
        let listing = serde_json::to_string(&s.summaries()).unwrap();
        assert!(!listing.contains(USDC));
        assert!(listing.contains("sell_token"));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut s = store();
        s.set("scratch", RegisterValue::Json(serde_json::json!(1)), "x")
            .unwrap();
        s.clear();
        assert!(s.is_empty());
        assert!(s.get("scratch").is_none());
    }
}
