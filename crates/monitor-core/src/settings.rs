use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Track agent sessions running in terminal tabs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "session-monitor",
    about = "Track agent sessions running in terminal tabs",
    version
)]
pub struct Settings {
    /// Directory holding one JSON state file per session
    #[arg(long, env = "SESSION_MONITOR_DIR")]
    pub sessions_dir: Option<PathBuf>,

    /// View mode
    #[arg(long, default_value = "watch", value_parser = ["watch", "list", "discover", "prune"])]
    pub view: String,

    /// Reconciliation period in milliseconds (100-10000)
    #[arg(long, default_value = "500", value_parser = clap::value_parser!(u64).range(100..=10_000))]
    pub refresh_ms: u64,

    /// Pruning period in seconds (1-3600)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub prune_secs: u64,

    /// Minutes without an update before a window-addressable session is pruned (0 disables)
    #[arg(long, default_value = "360")]
    pub window_ttl_mins: u64,

    /// Minutes without an update before a session is shown as stale
    #[arg(long, default_value = "10")]
    pub stale_mins: u64,

    /// Program name matched by discovery and kill
    #[arg(long, default_value = "claude")]
    pub program: String,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "auto"])]
    pub theme: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.session-monitor/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_ttl_mins: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_mins: Option<u64>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".session-monitor").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear saved configuration");
            }
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = last.theme {
                settings.theme = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "refresh_ms") {
            if let Some(v) = last.refresh_ms {
                settings.refresh_ms = v.clamp(100, 10_000);
            }
        }
        if !is_arg_explicitly_set(&matches, "prune_secs") {
            if let Some(v) = last.prune_secs {
                settings.prune_secs = v.clamp(1, 3600);
            }
        }
        if !is_arg_explicitly_set(&matches, "window_ttl_mins") {
            if let Some(v) = last.window_ttl_mins {
                settings.window_ttl_mins = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "stale_mins") {
            if let Some(v) = last.stale_mins {
                settings.stale_mins = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!(error = %e, "could not persist last-used settings");
        }

        settings
    }

    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Session directory, defaulting to `~/.claude/monitor/sessions`.
    pub fn sessions_path(&self) -> PathBuf {
        self.sessions_dir.clone().unwrap_or_else(default_sessions_dir)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_secs)
    }

    /// TTL for window-addressable sessions; `None` when disabled.
    pub fn window_ttl(&self) -> Option<Duration> {
        (self.window_ttl_mins > 0).then(|| Duration::from_secs(self.window_ttl_mins * 60))
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_mins * 60)
    }
}

/// `~/.claude/monitor/sessions`, where agent hooks write their state files.
pub fn default_sessions_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
        .join("monitor")
        .join("sessions")
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            theme: Some(s.theme.clone()),
            refresh_ms: Some(s.refresh_ms),
            prune_secs: Some(s.prune_secs),
            window_ttl_mins: Some(s.window_ttl_mins),
            stale_mins: Some(s.stale_mins),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
