// orchestrator-service-rs/src/registry.rs
// Process-wide table of repair sessions.
//
// Each session sits behind its own lock so pollers of one session never wait
// on another. The loop set makes sure a session is driven by at most one task.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared_types::DebugSession;
use tokio::sync::RwLock;

pub type SharedSession = Arc<RwLock<DebugSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    active_loops: Mutex<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: DebugSession) -> SharedSession {
        let id = session.session_id().to_string();
        let shared = Arc::new(RwLock::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Mark a session's loop as running. Returns `None` if another task
    /// already holds it. The claim is released when the guard drops, so a
    /// loop that panics or is cancelled does not lock the session out.
    pub fn claim_loop(&self, session_id: &str) -> Option<LoopClaim<'_>> {
        let claimed = self.loops().insert(session_id.to_string());
        claimed.then(|| LoopClaim {
            registry: self,
            session_id: session_id.to_string(),
        })
    }

    pub fn is_loop_running(&self, session_id: &str) -> bool {
        self.loops().contains(session_id)
    }

    fn loops(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.active_loops.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to drive one session's loop.
#[must_use = "the claim is released as soon as it is dropped"]
pub struct LoopClaim<'a> {
    registry: &'a SessionRegistry,
    session_id: String,
}

impl Drop for LoopClaim<'_> {
    fn drop(&mut self) {
        self.registry.loops().remove(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get_returns_the_same_session() {
        let registry = SessionRegistry::new();
        let shared = registry.insert(DebugSession::new("s-1", "x = 1", 3, None)).await;

        let found = registry.get("s-1").await.expect("session is registered");
        assert!(Arc::ptr_eq(&shared, &found));
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("missing").await.is_none());
    }

    #[test]
    fn a_loop_can_only_be_claimed_once_until_released() {
        let registry = SessionRegistry::new();
        let claim = registry.claim_loop("s-1");
        assert!(claim.is_some());
        assert!(registry.claim_loop("s-1").is_none());
        assert!(registry.claim_loop("s-2").is_some());

        drop(claim);
        assert!(!registry.is_loop_running("s-1"));
        assert!(registry.claim_loop("s-1").is_some());
    }

    #[test]
    fn an_unwinding_holder_releases_its_claim() {
        let registry = SessionRegistry::new();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _claim = registry.claim_loop("s-1");
            panic!("loop crashed");
        }));

        assert!(unwound.is_err());
        assert!(registry.claim_loop("s-1").is_some());
    }
}
