//! Session state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::registers::{GuardPolicy, RegisterStore, ValidatorConfig};

/// One conversation's state: a register store and activity timestamps.
///
/// Created on the first tool call for a conversation key; torn down on
/// explicit end or idle prune. Registers never cross sessions; this is
/// the primary confidentiality and integrity boundary.
#[derive(Debug)]
pub struct Session {
    /// Internal session id.
    pub id: Uuid,
    /// The external conversation key this session serves.
    pub key: String,
    /// The session-private register store.
    pub registers: RegisterStore,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last tool-gate activity; drives idle pruning.
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session governed by the shared policy.
    pub fn new(key: &str, policy: Arc<GuardPolicy>, validators: ValidatorConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.to_string(),
            registers: RegisterStore::new(policy, validators),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Record activity.
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Discard all registers. Called at teardown.
    pub fn end(&mut self) {
        self.registers.clear();
    }
}
