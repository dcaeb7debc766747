//! Per-session serialization lanes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::GateError;
use crate::hooks::{GateEvent, HookRegistry};
use crate::registers::{GuardPolicy, ValidatorConfig};
use crate::session::Session;

/// Warn when the lane count exceeds this threshold.
const LANE_COUNT_WARNING_THRESHOLD: usize = 1000;

/// One mutual-exclusion lane per session key, plus one global lane for
/// operations declared cross-session.
///
/// `acquire` waits for any prior in-flight invocation on the same session,
/// bounded by a deadline; the returned guard releases on every exit path,
/// so a lane is never left poisoned. Idle lanes are pruned, which tears
/// down their register stores.
pub struct LaneManager {
    lanes: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    global: Arc<Mutex<()>>,
    policy: Arc<GuardPolicy>,
    validators: ValidatorConfig,
    hooks: Arc<HookRegistry>,
}

impl LaneManager {
    /// Create a lane manager sharing the process-wide policy.
    pub fn new(
        policy: Arc<GuardPolicy>,
        validators: ValidatorConfig,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            lanes: RwLock::new(HashMap::new()),
            global: Arc::new(Mutex::new(())),
            policy,
            validators,
            hooks,
        }
    }

    /// Get or create the session behind a conversation key.
    pub async fn get_or_create(&self, session_key: &str) -> Arc<Mutex<Session>> {
        // Fast path: lane exists.
        {
            let lanes = self.lanes.read().await;
            if let Some(lane) = lanes.get(session_key) {
                return Arc::clone(lane);
            }
        }

        // Slow path: create, double-checking after the write lock.
        let mut lanes = self.lanes.write().await;
        if let Some(lane) = lanes.get(session_key) {
            return Arc::clone(lane);
        }

        let session = Session::new(session_key, Arc::clone(&self.policy), self.validators);
        let lane = Arc::new(Mutex::new(session));
        lanes.insert(session_key.to_string(), Arc::clone(&lane));

        if lanes.len() >= LANE_COUNT_WARNING_THRESHOLD && lanes.len() % 100 == 0 {
            tracing::warn!(
                lanes = lanes.len(),
                "high session lane count; consider a shorter idle timeout"
            );
        }

        // Fire SessionStart without holding up the caller.
        let hooks = Arc::clone(&self.hooks);
        let key = session_key.to_string();
        tokio::spawn(async move {
            hooks.notify(&GateEvent::SessionStart { session: key }).await;
        });

        lane
    }

    /// Acquire exclusive access to a session, waiting at most `deadline`
    /// for any prior in-flight invocation to finish.
    pub async fn acquire(
        &self,
        session_key: &str,
        deadline: Duration,
    ) -> Result<OwnedMutexGuard<Session>, GateError> {
        let lane = self.get_or_create(session_key).await;
        match tokio::time::timeout(deadline, lane.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(session = session_key, ?deadline, "lane acquisition timed out");
                Err(GateError::LaneTimeout {
                    session: session_key.to_string(),
                    waited: deadline,
                })
            }
        }
    }

    /// Acquire the global cross-session lane.
    pub async fn acquire_global(
        &self,
        deadline: Duration,
    ) -> Result<OwnedMutexGuard<()>, GateError> {
        match tokio::time::timeout(deadline, Arc::clone(&self.global).lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(GateError::LaneTimeout {
                session: "<global>".to_string(),
                waited: deadline,
            }),
        }
    }

    /// Explicitly end a session: wait for in-flight work, discard its
    /// registers, remove the lane, and fire the session-end hook.
    pub async fn end_session(&self, session_key: &str, deadline: Duration) -> Result<(), GateError> {
        let lane = {
            let mut lanes = self.lanes.write().await;
            lanes.remove(session_key)
        };
        let Some(lane) = lane else {
            return Ok(());
        };

        // A removed lane can still be held by an in-flight invocation; it
        // is allowed to finish (bounded) before the registers go away.
        let mut session = match tokio::time::timeout(deadline, lane.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                return Err(GateError::LaneTimeout {
                    session: session_key.to_string(),
                    waited: deadline,
                });
            }
        };
        session.end();
        drop(session);

        self.hooks
            .notify(&GateEvent::SessionEnd {
                session: session_key.to_string(),
            })
            .await;
        tracing::info!(session = session_key, "session ended");
        Ok(())
    }

    /// Prune sessions idle longer than `max_idle`. Contended lanes are
    /// skipped, since someone is actively using them. Returns the prune count.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let cutoff = chrono::Utc::now() - chrono::TimeDelta::seconds(max_idle.as_secs() as i64);

        let stale: Vec<String> = {
            let lanes = self.lanes.read().await;
            lanes
                .iter()
                .filter_map(|(key, lane)| {
                    let session = lane.try_lock().ok()?;
                    (session.last_active_at < cutoff).then(|| key.clone())
                })
                .collect()
        };

        if stale.is_empty() {
            return 0;
        }

        let count = {
            let mut lanes = self.lanes.write().await;
            let before = lanes.len();
            for key in &stale {
                let Some(lane) = lanes.get(key).map(Arc::clone) else {
                    continue;
                };
                // Re-check under the write lock; skip if it became active.
                match lane.try_lock() {
                    Ok(mut session) if session.last_active_at < cutoff => {
                        session.end();
                        drop(session);
                        lanes.remove(key);
                    }
                    _ => {}
                }
            }
            before - lanes.len()
        };

        for key in &stale {
            let hooks = Arc::clone(&self.hooks);
            let key = key.clone();
            tokio::spawn(async move {
                hooks.notify(&GateEvent::SessionEnd { session: key }).await;
            });
        }

        if count > 0 {
            tracing::info!(pruned = count, idle_secs = max_idle.as_secs(), "pruned idle sessions");
        }
        count
    }

    /// Number of live lanes.
    pub async fn lane_count(&self) -> usize {
        self.lanes.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RegisterValue;

    fn manager() -> LaneManager {
        LaneManager::new(
            Arc::new(GuardPolicy::standard()),
            ValidatorConfig::default(),
            Arc::new(HookRegistry::new()),
        )
    }

    #[tokio::test]
    async fn same_key_returns_same_lane() {
        let mgr = manager();
        let a = mgr.get_or_create("conv-1").await;
        let b = mgr.get_or_create("conv-1").await;
        assert!(Arc::ptr_eq(&a, &b));

        let c = mgr.get_or_create("conv-2").await;
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn concurrent_get_or_create_same_key_returns_same_lane() {
        let mgr = Arc::new(manager());

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move { mgr.get_or_create("shared").await })
            })
            .collect();

        let mut lanes = Vec::new();
        for handle in handles {
            lanes.push(handle.await.expect("task should not panic"));
        }
        for lane in &lanes {
            assert!(Arc::ptr_eq(&lanes[0], lane));
        }
    }

    #[tokio::test]
    async fn acquire_times_out_when_lane_is_held() {
        let mgr = manager();
        let _held = mgr
            .acquire("busy", Duration::from_secs(1))
            .await
            .unwrap();

        let err = mgr
            .acquire("busy", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::LaneTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn lane_released_after_guard_drop() {
        let mgr = manager();
        {
            let _guard = mgr.acquire("conv", Duration::from_secs(1)).await.unwrap();
        }
        // Released cleanly; a second acquisition succeeds immediately.
        let _guard = mgr.acquire("conv", Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let mgr = manager();
        {
            let mut s1 = mgr.acquire("s1", Duration::from_secs(1)).await.unwrap();
            s1.registers
                .set("scratch", RegisterValue::Json(serde_json::json!("secret")), "register_set")
                .unwrap();
        }
        let s2 = mgr.acquire("s2", Duration::from_secs(1)).await.unwrap();
        assert!(s2.registers.get("scratch").is_none());
    }

    #[tokio::test]
    async fn end_session_discards_registers_and_lane() {
        let mgr = manager();
        {
            let mut s = mgr.acquire("gone", Duration::from_secs(1)).await.unwrap();
            s.registers
                .set("scratch", RegisterValue::Json(serde_json::json!(1)), "register_set")
                .unwrap();
        }
        mgr.end_session("gone", Duration::from_secs(1)).await.unwrap();
        assert_eq!(mgr.lane_count().await, 0);

        // A new session under the same key starts empty.
        let s = mgr.acquire("gone", Duration::from_secs(1)).await.unwrap();
        assert!(s.registers.is_empty());
    }

    #[tokio::test]
    async fn end_session_unknown_key_is_a_noop() {
        let mgr = manager();
        mgr.end_session("never-existed", Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn prune_removes_only_idle_sessions() {
        let mgr = manager();
        mgr.get_or_create("active").await;
        let stale = mgr.get_or_create("stale").await;
        {
            let mut session = stale.lock().await;
            session.last_active_at =
                chrono::Utc::now() - chrono::TimeDelta::seconds(86400);
        }

        let pruned = mgr.prune_idle(Duration::from_secs(3600)).await;
        assert_eq!(pruned, 1);
        assert_eq!(mgr.lane_count().await, 1);
    }

    #[tokio::test]
    async fn prune_skips_contended_lanes() {
        let mgr = manager();
        let lane = mgr.get_or_create("busy").await;
        {
            let mut session = lane.lock().await;
            session.last_active_at =
                chrono::Utc::now() - chrono::TimeDelta::seconds(86400);
        }
        let _held = lane.lock().await;

        let pruned = mgr.prune_idle(Duration::from_secs(3600)).await;
        assert_eq!(pruned, 0);
        assert_eq!(mgr.lane_count().await, 1);
    }

    #[tokio::test]
    async fn global_lane_is_exclusive() {
        let mgr = manager();
        let _held = mgr.acquire_global(Duration::from_secs(1)).await.unwrap();
        let err = mgr
            .acquire_global(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::LaneTimeout { .. }));
    }
}
