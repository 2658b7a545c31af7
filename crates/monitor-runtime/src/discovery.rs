//! Discovery of agent processes that never wrote a state file.
//!
//! Scans the process table for the agent program, maps each match to its
//! tty, and writes a synthetic `working` record for every tty not already
//! represented in the store. The record id is derived from the tty name, so
//! running discovery again against the same processes creates nothing new.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use monitor_core::models::{SessionRecord, SessionStatus, TerminalKind};
use monitor_data::store::SessionStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inspector::{ProcessInfo, ProcessInspector};

/// Id prefix for records created by discovery.
pub const DISCOVERED_PREFIX: &str = "discovered-";

/// Binaries that contain the program name but must never be registered.
const SELF_NAMES: &[&str] = &["session-monitor", "claude_monitor", "claude-monitor"];

/// Outcome of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Ids of newly written records.
    pub created: Vec<String>,
    /// Matching processes already represented or without a tty.
    pub already_tracked: usize,
    /// Matching processes that could not be inspected.
    pub uninspectable: usize,
}

pub struct Discovery {
    store: SessionStore,
    inspector: Arc<dyn ProcessInspector>,
    program: String,
}

impl Discovery {
    pub fn new(store: SessionStore, inspector: Arc<dyn ProcessInspector>, program: &str) -> Self {
        Self {
            store,
            inspector,
            program: program.to_string(),
        }
    }

    /// Run a discovery pass using the current time.
    pub fn run(&self) -> DiscoveryReport {
        self.run_at(Utc::now())
    }

    pub fn run_at(&self, now: DateTime<Utc>) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        let processes = match self.inspector.list_processes() {
            Ok(processes) => processes,
            Err(e) => {
                warn!(error = %e, "process listing failed; discovery skipped");
                return report;
            }
        };

        let known_handles: Vec<String> = self
            .store
            .list_all()
            .into_iter()
            .map(|r| r.terminal_session_id)
            .filter(|h| !h.is_empty())
            .collect();
        let mut claimed: BTreeSet<String> = BTreeSet::new();

        for process in processes
            .iter()
            .filter(|p| matches_program(&p.command, &self.program))
        {
            let Some(tty) = process.tty.as_deref() else {
                debug!(pid = process.pid, "matching process has no tty");
                report.already_tracked += 1;
                continue;
            };

            if claimed.contains(tty) || known_handles.iter().any(|h| handle_matches(h, tty)) {
                report.already_tracked += 1;
                continue;
            }

            match self.register(process, tty, now) {
                Ok(Some(session_id)) => {
                    claimed.insert(tty.to_string());
                    info!(session_id = %session_id, pid = process.pid, tty, "discovered session");
                    report.created.push(session_id);
                }
                Ok(None) => report.uninspectable += 1,
                Err(e) => {
                    warn!(pid = process.pid, tty, error = %e, "failed to write discovered session");
                    report.uninspectable += 1;
                }
            }
        }

        report
    }

    /// Write a record for `process`. `Ok(None)` when its cwd is unavailable.
    fn register(
        &self,
        process: &ProcessInfo,
        tty: &str,
        now: DateTime<Utc>,
    ) -> monitor_core::Result<Option<String>> {
        let cwd = match self.inspector.process_cwd(process.pid) {
            Ok(cwd) if !cwd.as_os_str().is_empty() => cwd,
            Ok(_) => return Ok(None),
            Err(e) => {
                debug!(pid = process.pid, error = %e, "skipping uninspectable process");
                return Ok(None);
            }
        };

        let session_id = discovered_id(tty);
        let stamp = now.fixed_offset();
        let record = SessionRecord {
            session_id: session_id.clone(),
            status: SessionStatus::Working,
            project: project_label(&cwd),
            cwd: cwd.to_string_lossy().into_owned(),
            terminal: TerminalKind::Device,
            terminal_session_id: format!("/dev/{tty}"),
            started_at: Some(stamp),
            updated_at: Some(stamp),
            last_prompt: String::new(),
        };
        self.store.write(&record)?;
        Ok(Some(session_id))
    }
}

/// Deterministic record id for a tty: `pts/3` → `discovered-pts-3`.
pub fn discovered_id(tty: &str) -> String {
    format!("{DISCOVERED_PREFIX}{}", tty.replace('/', "-"))
}

/// `true` when `command` looks like `program` and is not this monitor.
pub fn matches_program(command: &str, program: &str) -> bool {
    let base = Path::new(command.split_whitespace().next().unwrap_or(""))
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    !program.is_empty()
        && base.contains(program)
        && !SELF_NAMES.iter().any(|own| base.contains(own))
}

/// `true` when a recorded terminal identity refers to `tty`.
///
/// Matches the bare name, the device path, or a composite token containing
/// the device path at a word boundary (so `pts/1` does not match `pts/10`).
pub fn handle_matches(identity: &str, tty: &str) -> bool {
    let dev_path = format!("/dev/{tty}");
    if identity == tty || identity == dev_path {
        return true;
    }
    identity.match_indices(&dev_path).any(|(idx, _)| {
        identity[idx + dev_path.len()..]
            .chars()
            .next()
            .map(|c| !c.is_ascii_alphanumeric())
            .unwrap_or(true)
    })
}

fn project_label(cwd: &Path) -> String {
    cwd.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| cwd.to_string_lossy().into_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
