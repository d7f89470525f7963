//! Tracks in-flight batch runs so a reconnecting client can receive a
//! snapshot of what's active, with no replay of past events. Distinct
//! from `runner::SessionRegistry`, which tracks live browser sessions
//! rather than credential-rotation runs.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::control::messages::ServerEvent;

pub struct RunHandle {
    pub target_url: String,
    /// The owning connection's outgoing frame channel — what a
    /// `panic()` writes a `loginRunAborted` frame onto directly, since
    /// that's the exact wire event a client expects.
    sender: mpsc::Sender<ServerEvent>,
}

impl RunHandle {
    pub fn new(target_url: String, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { target_url, sender }
    }
}

/// Keyed by `run_id`. One entry per `runLogin` batch currently driving
/// credentials against a target, from `launch` until its `Complete` or
/// `Aborted` event is observed.
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunHandle>>,
}

impl RunRegistry {
    pub fn insert(&self, run_id: String, handle: RunHandle) {
        self.runs.write().unwrap().insert(run_id, handle);
    }

    pub fn remove(&self, run_id: &str) {
        self.runs.write().unwrap().remove(run_id);
    }

    /// `run_id`s of every run still tracked — what a reconnecting client
    /// is told is active.
    pub fn active_run_ids(&self) -> Vec<String> {
        self.runs.read().unwrap().keys().cloned().collect()
    }

    pub fn target_url(&self, run_id: &str) -> Option<String> {
        self.runs.read().unwrap().get(run_id).map(|h| h.target_url.clone())
    }

    /// `(run_id, sender)` for every tracked run, so a `panic()` can fan a
    /// `loginRunAborted` frame out to all of them without holding the
    /// read lock across the sends.
    pub fn senders(&self) -> Vec<(String, mpsc::Sender<ServerEvent>)> {
        self.runs.read().unwrap().iter().map(|(id, h)| (id.clone(), h.sender.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_remove_clears_the_active_id() {
        let registry = RunRegistry::default();
        let (tx, _rx) = mpsc::channel(1);
        registry.insert("run-1".into(), RunHandle::new("https://example.test".into(), tx));
        assert_eq!(registry.active_run_ids(), vec!["run-1".to_string()]);
        assert_eq!(registry.target_url("run-1").as_deref(), Some("https://example.test"));

        registry.remove("run-1");
        assert!(registry.active_run_ids().is_empty());
    }
}
