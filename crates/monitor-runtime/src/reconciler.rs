//! Reconciliation loop.
//!
//! Periodically re-reads the session directory, ranks the records and
//! publishes them as an immutable [`SessionSnapshot`] on a `watch` channel.
//! Readers always see a whole snapshot; the store is never modified here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use monitor_core::models::SessionRecord;
use monitor_core::ranking;
use monitor_data::store::SessionStore;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

/// Default reconciliation period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

// ── SessionSnapshot ───────────────────────────────────────────────────────────

/// One published view of the session directory.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Increments every time a changed view is published.
    pub generation: u64,
    /// When the directory was read.
    pub captured_at: DateTime<Utc>,
    /// Ranked sessions.
    pub sessions: Arc<[SessionRecord]>,
}

impl SessionSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            captured_at: Utc::now(),
            sessions: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Shared pointer published on the watch channel.
pub type SharedSnapshot = Arc<SessionSnapshot>;

// ── Reconciler ────────────────────────────────────────────────────────────────

pub struct Reconciler {
    store: SessionStore,
    interval: Duration,
}

impl Reconciler {
    pub fn new(store: SessionStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Read and rank the directory once.
    pub fn reconcile_once(&self) -> Vec<SessionRecord> {
        ranking::ranked(self.store.list_all())
    }

    /// Publish `sessions` unless they equal the current view.
    ///
    /// Returns `true` when a new snapshot was published.
    pub fn publish(tx: &watch::Sender<SharedSnapshot>, sessions: Vec<SessionRecord>) -> bool {
        tx.send_if_modified(|current| {
            if current.sessions.as_ref() == sessions.as_slice() {
                return false;
            }
            *current = Arc::new(SessionSnapshot {
                generation: current.generation + 1,
                captured_at: Utc::now(),
                sessions: Arc::from(sessions),
            });
            true
        })
    }

    /// Run until every receiver has been dropped.
    ///
    /// The first refresh happens immediately.
    pub async fn run(self, tx: watch::Sender<SharedSnapshot>) {
        let this = Arc::new(self);
        let mut interval = time::interval(this.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("session view has no subscribers; stopping reconciliation");
                break;
            }

            let worker = Arc::clone(&this);
            let sessions = match tokio::task::spawn_blocking(move || worker.reconcile_once()).await
            {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!(error = %e, "reconciliation task failed");
                    continue;
                }
            };

            if Self::publish(&tx, sessions) {
                let current = tx.borrow();
                tracing::trace!(
                    generation = current.generation,
                    sessions = current.len(),
                    "published session view"
                );
            }
        }
    }
}

/// Create the channel every loop publishes to / reads from.
pub fn session_channel() -> (watch::Sender<SharedSnapshot>, watch::Receiver<SharedSnapshot>) {
    watch::channel(Arc::new(SessionSnapshot::empty()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
