//! OS process inspection.
//!
//! Every interaction with the process table goes through [`ProcessInspector`]
//! so the pruning and discovery logic can be exercised with a fake. The
//! production implementation, [`PsInspector`], reads the tty column from
//! `ps`, working directories through `sysinfo` and signals with `pkill`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Mutex, OnceLock};

use monitor_core::error::{MonitorError, Result};
use regex::Regex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Bare tty name (`ttys001`, `pts/3`); `None` for processes without one.
    pub tty: Option<String>,
    /// Executable name as reported by `ps -o comm=`.
    pub command: String,
}

/// Access to the process table.
pub trait ProcessInspector: Send + Sync {
    /// Return the subset of `ttys` that have no attached process.
    ///
    /// Implementations must answer the whole batch with a single query.
    fn dead_ttys(&self, ttys: &BTreeSet<String>) -> Result<BTreeSet<String>>;

    /// List every running process.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Resolve the working directory of `pid`.
    fn process_cwd(&self, pid: u32) -> Result<PathBuf>;

    /// Send `SIGTERM` to processes on `tty` whose command line matches `program`.
    fn terminate_tty(&self, tty: &str, program: &str) -> Result<()>;
}

// ── PsInspector ───────────────────────────────────────────────────────────────

/// [`ProcessInspector`] backed by `ps`, `pkill` and a shared `sysinfo` table.
///
/// `sysinfo` does not expose the controlling tty, so the tty column still
/// comes from `ps`.
#[derive(Debug, Default)]
pub struct PsInspector {
    system: Mutex<System>,
}

impl PsInspector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessInspector for PsInspector {
    fn dead_ttys(&self, ttys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if ttys.is_empty() {
            return Ok(BTreeSet::new());
        }

        let stdout = run_capture("ps", &["-A", "-o", "tty="])
            .map_err(MonitorError::LivenessQuery)?;
        let live = parse_tty_column(&stdout);

        Ok(ttys
            .iter()
            .filter(|tty| !live.contains(tty.as_str()))
            .cloned()
            .collect())
    }

    fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        let stdout = read_process_table("ps", &["-A", "-o", "pid=,tty=,comm="])?;
        Ok(stdout.lines().filter_map(parse_process_line).collect())
    }

    fn process_cwd(&self, pid: u32) -> Result<PathBuf> {
        let target = Pid::from_u32(pid);
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            ProcessRefreshKind::new().with_cwd(UpdateKind::Always),
        );

        let process = system
            .process(target)
            .ok_or_else(|| MonitorError::DiscoveryProcess {
                pid,
                reason: "no such process".to_string(),
            })?;
        process
            .cwd()
            .map(|cwd| cwd.to_path_buf())
            .ok_or_else(|| MonitorError::DiscoveryProcess {
                pid,
                reason: "working directory not readable".to_string(),
            })
    }

    fn terminate_tty(&self, tty: &str, program: &str) -> Result<()> {
        if !is_tty_name(tty) {
            return Err(MonitorError::Config(format!("refusing to signal tty {tty:?}")));
        }
        let status = Command::new("pkill")
            .args(["-TERM", "-t", tty, "-f", program])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        // pkill exits 1 when nothing matched; that is not a failure here.
        match status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(MonitorError::Io(std::io::Error::other(format!(
                "pkill exited with {status}"
            )))),
        }
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn tty_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*(/[0-9]+)?$").expect("valid tty regex"))
}

/// `true` for a real tty name; `?`, `??` and `-` mean "no terminal".
pub fn is_tty_name(s: &str) -> bool {
    tty_regex().is_match(s)
}

/// Collect the distinct tty names from `ps -o tty=` output.
pub fn parse_tty_column(stdout: &str) -> BTreeSet<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|tty| is_tty_name(tty))
        .collect()
}

/// Parse one `pid tty comm` line. `comm` may contain spaces.
pub fn parse_process_line(line: &str) -> Option<ProcessInfo> {
    let mut parts = line.split_whitespace();
    let pid = parts.next()?.parse::<u32>().ok()?;
    let tty_raw = parts.next()?;
    let command = parts.collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        return None;
    }
    let tty = is_tty_name(tty_raw).then(|| tty_raw.to_string());
    Some(ProcessInfo { pid, tty, command })
}

/// Run a process-table listing; failures become [`MonitorError::ProcessList`].
fn read_process_table(program: &str, args: &[&str]) -> Result<String> {
    run_capture(program, args).map_err(MonitorError::ProcessList)
}

fn run_capture(program: &str, args: &[&str]) -> std::result::Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("failed to run {program}: {e}"))?;
    if !output.status.success() {
        return Err(format!("{program} exited with {}", output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tty_name() {
        assert!(is_tty_name("ttys001"));
        assert!(is_tty_name("pts/3"));
        assert!(is_tty_name("tty1"));
        assert!(!is_tty_name("?"));
        assert!(!is_tty_name("??"));
        assert!(!is_tty_name("-"));
        assert!(!is_tty_name(""));
        assert!(!is_tty_name("ttys001; rm -rf /"));
    }

    #[test]
    fn test_parse_tty_column() {
        let out = "ttys001\n??\n ttys001\nttys004\n?\npts/2\n";
        let ttys = parse_tty_column(out);
        assert_eq!(
            ttys.into_iter().collect::<Vec<_>>(),
            vec!["pts/2", "ttys001", "ttys004"]
        );
    }

    #[test]
    fn test_parse_process_line() {
        let p = parse_process_line("  4242 ttys003  claude").unwrap();
        assert_eq!(p.pid, 4242);
        assert_eq!(p.tty.as_deref(), Some("ttys003"));
        assert_eq!(p.command, "claude");

        let detached = parse_process_line("17 ?? /usr/sbin/some daemon").unwrap();
        assert_eq!(detached.tty, None);
        assert_eq!(detached.command, "/usr/sbin/some daemon");

        assert!(parse_process_line("abc ttys003 claude").is_none());
        assert!(parse_process_line("12 ttys003").is_none());
    }

    #[test]
    fn test_process_cwd_of_current_process() {
        let cwd = PsInspector::new().process_cwd(std::process::id()).unwrap();
        let expected = std::env::current_dir().unwrap();
        assert_eq!(
            cwd.canonicalize().unwrap(),
            expected.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_process_cwd_missing_pid_is_discovery_error() {
        let err = PsInspector::new().process_cwd(u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::DiscoveryProcess { pid: u32::MAX, .. }
        ));
    }

    #[test]
    fn test_failed_listing_is_process_list_error() {
        let err = read_process_table("session-monitor-missing-ps", &["-A"]).unwrap_err();
        assert!(matches!(err, MonitorError::ProcessList(_)));
    }

    #[test]
    fn test_dead_ttys_empty_batch_skips_query() {
        let dead = PsInspector::new().dead_ttys(&BTreeSet::new()).unwrap();
        assert!(dead.is_empty());
    }
}
