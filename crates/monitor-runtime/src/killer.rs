//! User-initiated termination of a session.
//!
//! Sends `SIGTERM` to the agent running on the session's tty, then removes
//! the state file after a grace delay so the agent's own exit hook gets a
//! chance to run first. Window-addressable sessions have no tty to signal
//! and are only removed.

use std::sync::Arc;
use std::time::Duration;

use monitor_core::error::{MonitorError, Result};
use monitor_data::store::SessionStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::inspector::ProcessInspector;

/// Delay between the signal and the record removal.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct Killer {
    store: SessionStore,
    inspector: Arc<dyn ProcessInspector>,
    program: String,
    grace: Duration,
}

impl Killer {
    pub fn new(
        store: SessionStore,
        inspector: Arc<dyn ProcessInspector>,
        program: &str,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            inspector,
            program: program.to_string(),
            grace,
        }
    }

    /// Signal the session and schedule removal of its record.
    ///
    /// Returns the handle of the detached removal task, or `None` when the
    /// record is already gone. A failed signal is logged and the record is
    /// still removed.
    pub async fn kill(&self, session_id: &str) -> Result<Option<JoinHandle<()>>> {
        let store = self.store.clone();
        let id = session_id.to_string();
        let record = tokio::task::spawn_blocking(move || store.load(&id))
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))??;
        let Some(record) = record else {
            debug!(session_id, "kill requested for unknown session");
            return Ok(None);
        };

        if let Some(tty) = record.tty_name() {
            let tty = tty.to_string();
            let inspector = Arc::clone(&self.inspector);
            let program = self.program.clone();
            let signalled = tty.clone();
            match tokio::task::spawn_blocking(move || inspector.terminate_tty(&tty, &program)).await
            {
                Ok(Ok(())) => info!(session_id, tty = %signalled, "sent SIGTERM to session"),
                Ok(Err(e)) => warn!(session_id, tty = %signalled, error = %e, "failed to signal session"),
                Err(e) => warn!(session_id, error = %e, "signal task failed"),
            }
        } else {
            debug!(session_id, "session has no tty; removing record only");
        }

        let store = self.store.clone();
        let id = session_id.to_string();
        let grace = self.grace;
        Ok(Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removal = {
                let id = id.clone();
                tokio::task::spawn_blocking(move || store.remove(&id)).await
            };
            match removal {
                Ok(Ok(true)) => info!(session_id = %id, "removed killed session"),
                Ok(Ok(false)) => debug!(session_id = %id, "killed session already removed"),
                Ok(Err(e)) => warn!(session_id = %id, error = %e, "failed to remove killed session"),
                Err(e) => warn!(session_id = %id, error = %e, "removal task failed"),
            }
        })))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeInspector;
    use monitor_core::models::{SessionRecord, TerminalKind};
    use tempfile::TempDir;

    fn setup(grace: Duration) -> (TempDir, SessionStore, Arc<FakeInspector>, Killer) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let fake = Arc::new(FakeInspector::default());
        let killer = Killer::new(store.clone(), fake.clone(), "claude", grace);
        (dir, store, fake, killer)
    }

    #[tokio::test]
    async fn test_kill_signals_tty_then_removes_record() {
        let (_dir, store, fake, killer) = setup(Duration::from_millis(10));
        let mut record = SessionRecord::new("s1");
        record.terminal = TerminalKind::Device;
        record.terminal_session_id = "/dev/ttys004".to_string();
        store.write(&record).unwrap();

        let removal = killer.kill("s1").await.unwrap().unwrap();
        assert_eq!(
            fake.terminated.lock().unwrap().as_slice(),
            &[("ttys004".to_string(), "claude".to_string())]
        );

        removal.await.unwrap();
        assert!(store.load("s1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_survives_until_grace_elapses() {
        let (_dir, store, _fake, killer) = setup(Duration::from_secs(60));
        let mut record = SessionRecord::new("s1");
        record.terminal = TerminalKind::Device;
        record.terminal_session_id = "/dev/ttys004".to_string();
        store.write(&record).unwrap();

        let removal = killer.kill("s1").await.unwrap().unwrap();
        assert!(store.load("s1").unwrap().is_some());
        removal.abort();
    }

    #[tokio::test]
    async fn test_window_session_is_removed_without_signal() {
        let (_dir, store, fake, killer) = setup(Duration::from_millis(1));
        let mut record = SessionRecord::new("w1");
        record.terminal = TerminalKind::Window;
        record.terminal_session_id = "w0t0p0:ABC".to_string();
        store.write(&record).unwrap();

        killer.kill("w1").await.unwrap().unwrap().await.unwrap();
        assert!(fake.terminated.lock().unwrap().is_empty());
        assert!(store.load("w1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kill_unknown_session_is_noop() {
        let (_dir, _store, fake, killer) = setup(Duration::from_millis(1));
        assert!(killer.kill("ghost").await.unwrap().is_none());
        assert!(fake.terminated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_signal_still_removes_record() {
        let (_dir, store, fake, killer) = setup(Duration::from_millis(1));
        *fake.fail_terminate.lock().unwrap() = true;
        let mut record = SessionRecord::new("s1");
        record.terminal = TerminalKind::Device;
        record.terminal_session_id = "/dev/ttys004".to_string();
        store.write(&record).unwrap();

        killer.kill("s1").await.unwrap().unwrap().await.unwrap();
        assert!(store.load("s1").unwrap().is_none());
    }
}
