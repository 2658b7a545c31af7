//! In-memory [`ProcessInspector`] for tests.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use monitor_core::error::{MonitorError, Result};

use crate::inspector::{ProcessInfo, ProcessInspector};

#[derive(Default)]
pub struct FakeInspector {
    pub live_ttys: Mutex<BTreeSet<String>>,
    pub processes: Mutex<Vec<ProcessInfo>>,
    pub cwds: Mutex<HashMap<u32, PathBuf>>,
    pub fail_liveness: Mutex<bool>,
    pub liveness_calls: AtomicUsize,
    pub liveness_batches: Mutex<Vec<BTreeSet<String>>>,
    pub terminated: Mutex<Vec<(String, String)>>,
    pub fail_terminate: Mutex<bool>,
}

impl FakeInspector {
    pub fn with_live_ttys(ttys: &[&str]) -> Self {
        let fake = Self::default();
        *fake.live_ttys.lock().unwrap() = ttys.iter().map(|t| t.to_string()).collect();
        fake
    }

    pub fn add_process(&self, pid: u32, tty: Option<&str>, command: &str, cwd: Option<&str>) {
        self.processes.lock().unwrap().push(ProcessInfo {
            pid,
            tty: tty.map(str::to_string),
            command: command.to_string(),
        });
        if let Some(cwd) = cwd {
            self.cwds.lock().unwrap().insert(pid, PathBuf::from(cwd));
        }
    }

    pub fn liveness_calls(&self) -> usize {
        self.liveness_calls.load(Ordering::SeqCst)
    }
}

impl ProcessInspector for FakeInspector {
    fn dead_ttys(&self, ttys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        self.liveness_calls.fetch_add(1, Ordering::SeqCst);
        self.liveness_batches.lock().unwrap().push(ttys.clone());
        if *self.fail_liveness.lock().unwrap() {
            return Err(MonitorError::LivenessQuery("ps not available".to_string()));
        }
        let live = self.live_ttys.lock().unwrap();
        Ok(ttys.iter().filter(|t| !live.contains(*t)).cloned().collect())
    }

    fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self.processes.lock().unwrap().clone())
    }

    fn process_cwd(&self, pid: u32) -> Result<PathBuf> {
        self.cwds
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or_else(|| MonitorError::DiscoveryProcess {
                pid,
                reason: "permission denied".to_string(),
            })
    }

    fn terminate_tty(&self, tty: &str, program: &str) -> Result<()> {
        if *self.fail_terminate.lock().unwrap() {
            return Err(MonitorError::Io(std::io::Error::other("pkill not found")));
        }
        self.terminated
            .lock()
            .unwrap()
            .push((tty.to_string(), program.to_string()));
        Ok(())
    }
}
