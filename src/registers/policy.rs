//! Guard policy: which origins may write which registers.
//!
//! The table is immutable after startup and consulted by every store write.
//! Keys fall into three categories: agent-settable (the generic setter may
//! write), tool-restricted (only named origin tools), and derived-only
//! (written solely by the gate after a preset resolution, under a
//! `preset:<name>` origin). Rejections name the allowed origins; that is
//! the anti-hallucination guarantee: critical identity and amount fields
//! only enter the system through a narrow, auditable set of producers.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::RegisterError;
use crate::registers::validators::ValueFormat;

/// Origin prefix marking gate-internal preset writes.
pub const PRESET_ORIGIN_PREFIX: &str = "preset:";

/// Who may originate a write to a register key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRule {
    /// Any tool, including the generic setter.
    Any,
    /// Only the named origins. `preset:<name>` entries denote gate-internal
    /// writes after resolving that preset.
    Origins(BTreeSet<String>),
}

impl WriteRule {
    /// Build an origins rule from a list of names.
    pub fn origins<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Origins(names.into_iter().map(Into::into).collect())
    }

    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Origins(set) => set.contains(origin),
        }
    }
}

/// Policy entry for one register key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRule {
    /// The value shape this key holds.
    pub format: ValueFormat,
    /// Who may write it.
    pub rule: WriteRule,
}

impl Default for GuardRule {
    /// Keys absent from the table are free-form scratch space: any origin,
    /// JSON values. Guarded keys must be listed explicitly.
    fn default() -> Self {
        Self {
            format: ValueFormat::Json,
            rule: WriteRule::Any,
        }
    }
}

/// Which of the three policy categories a key falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCategory {
    /// Generic setter tools may write.
    AgentSettable,
    /// Only named origin tools may write.
    ToolRestricted,
    /// Written exclusively by the gate after a preset resolution.
    DerivedOnly,
}

/// The static, process-wide write-origin table.
#[derive(Debug, Clone, Default)]
pub struct GuardPolicy {
    rules: BTreeMap<String, GuardRule>,
}

impl GuardPolicy {
    /// An empty policy: every key is scratch space. Useful in tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a policy from explicit entries.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, GuardRule)>,
        S: Into<String>,
    {
        Self {
            rules: rules.into_iter().map(|(k, r)| (k.into(), r)).collect(),
        }
    }

    /// The default table for the swap workflow: lookup tools own identity
    /// fields, amounts are agent-settable, quote results are derived-only.
    pub fn standard() -> Self {
        Self::from_rules([
            (
                "wallet_address",
                GuardRule {
                    format: ValueFormat::Address,
                    rule: WriteRule::origins(["wallet_lookup"]),
                },
            ),
            (
                "sell_token",
                GuardRule {
                    format: ValueFormat::Address,
                    rule: WriteRule::origins(["token_lookup"]),
                },
            ),
            (
                "buy_token",
                GuardRule {
                    format: ValueFormat::Address,
                    rule: WriteRule::origins(["token_lookup"]),
                },
            ),
            (
                "sell_amount",
                GuardRule {
                    format: ValueFormat::Amount,
                    rule: WriteRule::Any,
                },
            ),
            (
                "buy_amount",
                GuardRule {
                    format: ValueFormat::Amount,
                    rule: WriteRule::Any,
                },
            ),
            (
                "swap_quote",
                GuardRule {
                    format: ValueFormat::Json,
                    rule: WriteRule::origins(["preset:swap_quote"]),
                },
            ),
        ])
    }

    /// The rule for a key, falling back to scratch-space defaults.
    pub fn rule(&self, key: &str) -> GuardRule {
        self.rules.get(key).cloned().unwrap_or_default()
    }

    /// The declared value format for a key.
    pub fn format(&self, key: &str) -> ValueFormat {
        self.rule(key).format
    }

    /// Which category a key falls into.
    pub fn category(&self, key: &str) -> GuardCategory {
        match &self.rule(key).rule {
            WriteRule::Any => GuardCategory::AgentSettable,
            WriteRule::Origins(set) => {
                if set.iter().all(|o| o.starts_with(PRESET_ORIGIN_PREFIX)) {
                    GuardCategory::DerivedOnly
                } else {
                    GuardCategory::ToolRestricted
                }
            }
        }
    }

    /// Check a write attempt. Rejection happens before any mutation.
    pub fn check_write(&self, key: &str, origin: &str) -> Result<(), RegisterError> {
        let rule = self.rule(key);
        if rule.rule.allows(origin) {
            return Ok(());
        }
        let allowed = match &rule.rule {
            WriteRule::Any => Vec::new(),
            WriteRule::Origins(set) => set.iter().cloned().collect(),
        };
        tracing::warn!(
            register = key,
            origin,
            ?allowed,
            "guard policy rejected register write"
        );
        Err(RegisterError::ForbiddenWrite {
            key: key.to_string(),
            origin: origin.to_string(),
            allowed,
        })
    }

    /// Iterate the explicitly declared keys.
    pub fn declared_keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_keys_are_agent_settable_json() {
        let policy = GuardPolicy::standard();
        assert_eq!(policy.category("scratch"), GuardCategory::AgentSettable);
        assert_eq!(policy.format("scratch"), ValueFormat::Json);
        assert!(policy.check_write("scratch", "register_set").is_ok());
    }

    #[test]
    fn guarded_key_rejects_generic_setter() {
        let policy = GuardPolicy::standard();
        let err = policy.check_write("sell_token", "register_set").unwrap_err();
        match err {
            RegisterError::ForbiddenWrite { allowed, .. } => {
                assert_eq!(allowed, vec!["token_lookup".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn guarded_key_accepts_declared_origin() {
        let policy = GuardPolicy::standard();
        assert!(policy.check_write("sell_token", "token_lookup").is_ok());
        assert!(policy.check_write("wallet_address", "wallet_lookup").is_ok());
    }

    #[test]
    fn derived_only_rejects_every_tool() {
        let policy = GuardPolicy::standard();
        assert!(policy.check_write("swap_quote", "register_set").is_err());
        assert!(policy.check_write("swap_quote", "token_lookup").is_err());
        assert!(policy.check_write("swap_quote", "preset:swap_quote").is_ok());
    }

    #[test]
    fn categories() {
        let policy = GuardPolicy::standard();
        assert_eq!(policy.category("sell_amount"), GuardCategory::AgentSettable);
        assert_eq!(policy.category("sell_token"), GuardCategory::ToolRestricted);
        assert_eq!(policy.category("swap_quote"), GuardCategory::DerivedOnly);
    }
}
