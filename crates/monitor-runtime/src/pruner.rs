//! Pruning loop.
//!
//! Every cycle takes the current published view, groups sessions by terminal
//! handle, asks the [`LivenessProber`] about all device handles in one batch
//! and removes every session attached to a dead handle. Window-addressable
//! sessions are expired through [`WindowPolicy`] instead.
//!
//! The whole cycle runs on a blocking worker so a slow `ps` never stalls the
//! reconciliation loop or the UI.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use monitor_core::models::SessionRecord;
use monitor_data::store::SessionStore;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::liveness::{LivenessProber, WindowPolicy};
use crate::reconciler::SharedSnapshot;

/// Default pruning period.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(5);

// ── PruneReport ───────────────────────────────────────────────────────────────

/// Outcome of one pruning cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Distinct device ttys sent to the liveness query.
    pub ttys_checked: usize,
    /// Handles judged dead (tty names and expired window tokens).
    pub dead_handles: Vec<String>,
    /// Session ids whose files were removed.
    pub removed: Vec<String>,
    /// `true` when the liveness query failed and nothing was pruned.
    pub query_failed: bool,
}

/// Sessions grouped by the handle that decides their liveness.
#[derive(Debug, Default)]
struct HandleGroups {
    /// tty name → (session id, recorded handle).
    by_tty: BTreeMap<String, Vec<(String, String)>>,
    /// Window-addressable sessions whose TTL has run out.
    expired_windows: Vec<(String, String)>,
}

impl HandleGroups {
    fn collect(sessions: &[SessionRecord], policy: &WindowPolicy, now: DateTime<Utc>) -> Self {
        let mut groups = Self::default();
        for session in sessions {
            if let Some(tty) = session.tty_name() {
                groups.by_tty.entry(tty.to_string()).or_default().push((
                    session.session_id.clone(),
                    session.terminal_session_id.clone(),
                ));
            } else if policy.is_expired(session, now) {
                groups.expired_windows.push((
                    session.session_id.clone(),
                    session.terminal_session_id.clone(),
                ));
            }
        }
        groups
    }

    fn is_empty(&self) -> bool {
        self.by_tty.is_empty() && self.expired_windows.is_empty()
    }
}

// ── Pruner ────────────────────────────────────────────────────────────────────

pub struct Pruner {
    store: SessionStore,
    prober: LivenessProber,
    window_policy: WindowPolicy,
}

impl Pruner {
    pub fn new(store: SessionStore, prober: LivenessProber, window_policy: WindowPolicy) -> Self {
        Self {
            store,
            prober,
            window_policy,
        }
    }

    /// Run one cycle against `sessions` using the current time.
    pub fn run_cycle(&self, sessions: &[SessionRecord]) -> PruneReport {
        self.run_cycle_at(sessions, Utc::now())
    }

    /// Run one cycle against `sessions` as of `now`.
    pub fn run_cycle_at(&self, sessions: &[SessionRecord], now: DateTime<Utc>) -> PruneReport {
        let groups = HandleGroups::collect(sessions, &self.window_policy, now);
        let mut report = PruneReport::default();

        if groups.is_empty() {
            return report;
        }

        let ttys: BTreeSet<String> = groups.by_tty.keys().cloned().collect();
        report.ttys_checked = ttys.len();

        let dead = match self.prober.dead_ttys(&ttys) {
            Ok(dead) => dead,
            Err(e) => {
                warn!(error = %e, "liveness query failed; skipping prune cycle");
                report.query_failed = true;
                return report;
            }
        };

        for tty in &dead {
            let Some(members) = groups.by_tty.get(tty) else {
                continue;
            };
            report.dead_handles.push(tty.clone());
            for (session_id, handle) in members {
                if self.remove(session_id, handle, "tty has no processes") {
                    report.removed.push(session_id.clone());
                }
            }
        }

        for (session_id, handle) in &groups.expired_windows {
            report.dead_handles.push(handle.clone());
            // A writer may have refreshed updated_at since the snapshot.
            let removed = self.remove_checked(
                session_id,
                handle,
                "window session exceeded ttl",
                |current| self.window_policy.is_expired(current, now),
            );
            if removed {
                report.removed.push(session_id.clone());
            }
        }

        report
    }

    fn remove(&self, session_id: &str, handle: &str, reason: &str) -> bool {
        self.remove_checked(session_id, handle, reason, |_| true)
    }

    fn remove_checked(
        &self,
        session_id: &str,
        handle: &str,
        reason: &str,
        still_dead: impl FnOnce(&SessionRecord) -> bool,
    ) -> bool {
        match self.store.remove_if(session_id, handle, still_dead) {
            Ok(true) => {
                info!(session_id, handle, reason, "pruned session");
                true
            }
            Ok(false) => {
                debug!(session_id, handle, "session already gone or rebound");
                false
            }
            Err(e) => {
                warn!(session_id, handle, error = %e, "failed to prune session");
                false
            }
        }
    }

    /// Run one cycle on a blocking worker.
    pub async fn prune(self: &Arc<Self>, sessions: Arc<[SessionRecord]>) -> PruneReport {
        let this = Arc::clone(self);
        match tokio::task::spawn_blocking(move || this.run_cycle(&sessions)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "prune worker failed");
                PruneReport::default()
            }
        }
    }

    /// Prune on a fixed interval using the latest published view.
    ///
    /// The first cycle runs one period after start so the reconciler has
    /// published at least once.
    pub async fn run(self: Arc<Self>, rx: watch::Receiver<SharedSnapshot>, period: Duration) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            interval.tick().await;

            if rx.has_changed().is_err() {
                debug!("session view closed; stopping pruning");
                break;
            }

            let sessions = Arc::clone(&rx.borrow().sessions);
            if sessions.is_empty() {
                continue;
            }

            let report = self.prune(sessions).await;
            if !report.removed.is_empty() {
                debug!(removed = report.removed.len(), "prune cycle finished");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
