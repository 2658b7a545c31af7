//! Directory-backed session store.
//!
//! Every session lives in `<dir>/<session_id>.json`. External agent hooks
//! create and rewrite those files; the monitor reads them, removes dead ones,
//! and writes records for discovered sessions. All writes from this side go
//! through a temporary file and a rename so readers never see a torn record.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use monitor_core::codec;
use monitor_core::error::{MonitorError, Result};
use monitor_core::models::SessionRecord;
use tracing::{debug, warn};

/// Extension of committed state files.
const RECORD_EXT: &str = "json";

/// Suffix of in-flight writes; never picked up by [`SessionStore::list_all`].
const TMP_SUFFIX: &str = ".json.tmp";

// ── ScanReport ────────────────────────────────────────────────────────────────

/// Outcome of one directory scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Successfully decoded records, in file-name order.
    pub records: Vec<SessionRecord>,
    /// Files that were skipped, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

// ── SessionStore ──────────────────────────────────────────────────────────────

/// Handle on a session directory. Cheap to clone; holds no open files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    /// Files already reported as undecodable, keyed by path, with the
    /// modification time and reason that were logged. Shared across clones.
    reported: Arc<Mutex<HashMap<PathBuf, (Option<SystemTime>, String)>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            reported: Arc::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for `session_id`.
    ///
    /// Rejects identifiers that would escape the directory.
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if !is_valid_session_id(session_id) {
            return Err(MonitorError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.dir.join(format!("{session_id}.{RECORD_EXT}")))
    }

    /// Load every decodable record. Never fails; problems are logged.
    ///
    /// A bad file is logged at `warn` the first time it is seen and again
    /// only after it changes; repeats in between go to `debug`.
    pub fn list_all(&self) -> Vec<SessionRecord> {
        let report = self.scan();
        self.log_failures(&report.failures);
        report.records
    }

    fn log_failures(&self, failures: &[(PathBuf, String)]) {
        let mut reported = self.reported.lock().unwrap_or_else(|e| e.into_inner());
        reported.retain(|path, _| failures.iter().any(|(p, _)| p == path));

        for (path, reason) in failures {
            let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
            let entry = (modified, reason.clone());
            if reported.get(path) == Some(&entry) {
                debug!(path = %path.display(), %reason, "still skipping session file");
                continue;
            }
            warn!(path = %path.display(), %reason, "skipping session file");
            reported.insert(path.clone(), entry);
        }
    }

    /// Scan the directory, returning decoded records and per-file failures.
    ///
    /// A missing or unreadable directory yields an empty report.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        if !self.dir.is_dir() {
            debug!(dir = %self.dir.display(), "session directory does not exist");
            return report;
        }

        for path in find_record_files(&self.dir) {
            match read_record(&path) {
                Ok(record) => {
                    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
                    if stem != record.session_id {
                        report.failures.push((
                            path.clone(),
                            format!(
                                "file name does not match session_id {:?}",
                                record.session_id
                            ),
                        ));
                        continue;
                    }
                    report.records.push(record);
                }
                Err(e) => report.failures.push((path, e.to_string())),
            }
        }

        report
    }

    /// Load a single record; `Ok(None)` when it does not exist.
    pub fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(session_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => codec::decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MonitorError::StoreIo { path, source }),
        }
    }

    /// Atomically write `record` to `<session_id>.json`.
    pub fn write(&self, record: &SessionRecord) -> Result<()> {
        let path = self.path_for(&record.session_id)?;
        let bytes = codec::encode(record)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| MonitorError::StoreIo {
            path: self.dir.clone(),
            source,
        })?;

        // One temp file per write; concurrent writers of an id never share one.
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", record.session_id))
            .suffix(TMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|source| MonitorError::StoreIo {
                path: self.dir.clone(),
                source,
            })?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|source| MonitorError::StoreIo {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&path).map_err(|e| MonitorError::StoreIo {
            path: path.clone(),
            source: e.error,
        })?;

        debug!(session_id = %record.session_id, "session record written");
        Ok(())
    }

    /// Remove a record. Returns `Ok(false)` when it was already gone.
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let path = self.path_for(session_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MonitorError::StoreIo { path, source }),
        }
    }

    /// Remove a record only if it still carries `handle`.
    ///
    /// The record is re-read first: when it has vanished or has been
    /// rewritten with a different terminal handle since the caller's
    /// snapshot, nothing is removed.
    pub fn remove_if_handle(&self, session_id: &str, handle: &str) -> Result<bool> {
        self.remove_if(session_id, handle, |_| true)
    }

    /// Like [`SessionStore::remove_if_handle`], but the re-read record must
    /// also satisfy `still_dead`.
    pub fn remove_if(
        &self,
        session_id: &str,
        handle: &str,
        still_dead: impl FnOnce(&SessionRecord) -> bool,
    ) -> Result<bool> {
        let current = match self.load(session_id) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(false),
            Err(e @ (MonitorError::StoreIo { .. } | MonitorError::InvalidSessionId(_))) => {
                return Err(e)
            }
            // An undecodable file is mid-rewrite or corrupt; leave it alone.
            Err(e) => {
                debug!(session_id, error = %e, "not removing undecodable record");
                return Ok(false);
            }
        };

        if current.terminal_session_id != handle {
            debug!(
                session_id,
                expected = handle,
                found = %current.terminal_session_id,
                "handle changed since snapshot; keeping record"
            );
            return Ok(false);
        }

        if !still_dead(&current) {
            debug!(session_id, "record refreshed since snapshot; keeping it");
            return Ok(false);
        }

        self.remove(session_id)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `*.json` files directly inside `dir`, sorted by path.
pub fn find_record_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "error while listing session directory");
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == RECORD_EXT)
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

fn read_record(path: &Path) -> Result<SessionRecord> {
    let bytes = std::fs::read(path).map_err(|source| MonitorError::StoreIo {
        path: path.to_path_buf(),
        source,
    })?;
    codec::decode(&bytes)
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && !id.contains("..")
        && !id.contains('/')
        && !id.contains('\\')
        && !id.contains('\0')
}

// ── Tests ─────────────────────────────────────────────────────────────────────
