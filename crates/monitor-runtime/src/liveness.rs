//! Liveness decisions for terminal handles.
//!
//! Device-addressable sessions are checked against the process table in one
//! batched query. Window-addressable sessions cannot be resolved to a tty
//! without talking to the terminal application, so they fall back to
//! [`WindowPolicy`]: a record whose writer has gone quiet for longer than the
//! TTL is considered dead.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use monitor_core::error::Result;
use monitor_core::models::{SessionRecord, TerminalKind};
use tracing::debug;

use crate::inspector::ProcessInspector;

/// Batched tty liveness check.
#[derive(Clone)]
pub struct LivenessProber {
    inspector: Arc<dyn ProcessInspector>,
}

impl LivenessProber {
    pub fn new(inspector: Arc<dyn ProcessInspector>) -> Self {
        Self { inspector }
    }

    /// Return the ttys in `ttys` that have no attached process.
    ///
    /// Issues exactly one inspector query regardless of batch size, and none
    /// for an empty batch.
    pub fn dead_ttys(&self, ttys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if ttys.is_empty() {
            return Ok(BTreeSet::new());
        }
        let dead = self.inspector.dead_ttys(ttys)?;
        debug!(checked = ttys.len(), dead = dead.len(), "tty liveness query finished");
        Ok(dead)
    }
}

/// Secondary liveness rule for window-addressable sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Maximum quiet time before the session is treated as dead. `None`
    /// disables pruning of window-addressable sessions.
    pub ttl: Option<Duration>,
}

impl WindowPolicy {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { ttl }
    }

    pub fn disabled() -> Self {
        Self { ttl: None }
    }

    /// `true` when `record` is window-addressable and its last update is
    /// older than the TTL. Records without `updated_at` are kept.
    pub fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        record.terminal == TerminalKind::Window
            && record.has_handle()
            && record.is_stale(now, ttl)
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::new(Some(DEFAULT_WINDOW_TTL))
    }
}

/// Six hours.
pub const DEFAULT_WINDOW_TTL: Duration = Duration::from_secs(6 * 60 * 60);
