use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// `~/.session-monitor`, home of the saved settings and log files.
pub fn monitor_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".session-monitor")
}

/// Ensure `~/.session-monitor/` and `~/.session-monitor/logs/` exist.
///
/// Returns the monitor home directory.
pub fn ensure_directories() -> anyhow::Result<PathBuf> {
    let monitor_dir = monitor_home();
    std::fs::create_dir_all(monitor_dir.join("logs"))
        .with_context(|| format!("creating {}", monitor_dir.display()))?;
    Ok(monitor_dir)
}

/// Create the session directory so writers and the store agree on it.
pub fn ensure_sessions_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("creating session directory {}", path.display()))
}

/// Log file used by the interactive view when none is configured.
pub fn default_log_file(monitor_dir: &Path) -> PathBuf {
    monitor_dir.join("logs").join("monitor.log")
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map the CLI level names to `tracing` filter directives.
fn normalise_level(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// With `log_file` set, output is appended to that file without ANSI
/// colours; otherwise it goes to stderr. `RUST_LOG` overrides `log_level`.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(normalise_level(log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        let monitor_dir = result.expect("ensure_directories should succeed");
        assert_eq!(monitor_dir, tmp.path().join(".session-monitor"));
        assert!(monitor_dir.is_dir(), ".session-monitor dir must exist");
        assert!(monitor_dir.join("logs").is_dir(), "logs subdir must exist");
    }

    #[test]
    fn test_ensure_sessions_dir_creates_nested_path() {
        let tmp = TempDir::new().expect("tempdir");
        let sessions = tmp.path().join(".claude").join("monitor").join("sessions");
        ensure_sessions_dir(&sessions).expect("create sessions dir");
        assert!(sessions.is_dir());
        // Idempotent.
        ensure_sessions_dir(&sessions).expect("second call");
    }

    #[test]
    fn test_default_log_file() {
        let base = Path::new("/home/u/.session-monitor");
        assert_eq!(
            default_log_file(base),
            PathBuf::from("/home/u/.session-monitor/logs/monitor.log")
        );
    }

    #[test]
    fn test_normalise_level() {
        assert_eq!(normalise_level("DEBUG"), "debug");
        assert_eq!(normalise_level("CRITICAL"), "debug");
        assert_eq!(normalise_level("INFO"), "info");
        assert_eq!(normalise_level("WARNING"), "warn");
        assert_eq!(normalise_level("error"), "error");
        assert_eq!(normalise_level("trace"), "trace");
    }
}
