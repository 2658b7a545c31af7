use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::time::Duration;

use crate::formatting;

/// Lifecycle status reported by the process that owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// The agent has launched but not yet received work.
    Starting,
    /// The agent is busy on a prompt.
    Working,
    /// The agent finished and is idle.
    Done,
    /// The agent is blocked waiting on the user.
    Attention,
    /// Any value this monitor does not recognise.
    Unknown,
}

impl SessionStatus {
    /// Map a wire string onto a status; unrecognised values become `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "starting" => Self::Starting,
            "working" => Self::Working,
            "done" => Self::Done,
            "attention" => Self::Attention,
            _ => Self::Unknown,
        }
    }

    /// The lowercase wire string written into state files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Working => "working",
            Self::Done => "done",
            Self::Attention => "attention",
            Self::Unknown => "unknown",
        }
    }

    /// Status as shown to the user. Always one of the four known states.
    pub fn presentation(&self) -> Self {
        match self {
            Self::Unknown => Self::Starting,
            other => *other,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the terminal behind a session can be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    /// No usable terminal information.
    Unknown,
    /// A tty device path such as `/dev/ttys001` (Terminal.app style).
    Device,
    /// A composite window/tab/session token (iTerm2 style).
    Window,
}

impl TerminalKind {
    /// Map the `terminal` wire field onto a kind.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "terminal" | "tty" => Self::Device,
            "iterm2" | "iterm" => Self::Window,
            _ => Self::Unknown,
        }
    }

    /// Canonical wire string. `Unknown` encodes as an empty string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Device => "terminal",
            Self::Window => "iterm2",
        }
    }
}

/// One tracked session as stored in `<session_id>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Stable identifier, also the storage key.
    pub session_id: String,
    pub status: SessionStatus,
    /// Short project label (usually the basename of `cwd`).
    pub project: String,
    pub cwd: String,
    pub terminal: TerminalKind,
    /// Opaque handle of the terminal backing the session.
    pub terminal_session_id: String,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub last_prompt: String,
}

impl SessionRecord {
    /// Create a record with the given id and every other field defaulted.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Unknown,
            project: DEFAULT_PROJECT.to_string(),
            cwd: String::new(),
            terminal: TerminalKind::Unknown,
            terminal_session_id: String::new(),
            started_at: None,
            updated_at: None,
            last_prompt: String::new(),
        }
    }

    /// `true` when the record carries any terminal handle at all.
    pub fn has_handle(&self) -> bool {
        !self.terminal_session_id.is_empty()
    }

    /// Bare tty name (`ttys001`) for device-addressable sessions.
    pub fn tty_name(&self) -> Option<&str> {
        if self.terminal != TerminalKind::Device || self.terminal_session_id.is_empty() {
            return None;
        }
        let name = self
            .terminal_session_id
            .strip_prefix("/dev/")
            .unwrap_or(&self.terminal_session_id);
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Time elapsed since the session started, e.g. `"12m"`; empty when unknown.
    pub fn elapsed(&self, now: DateTime<Utc>) -> String {
        match self.started_at {
            Some(start) => {
                let secs = (now - start.with_timezone(&Utc)).num_seconds().max(0);
                formatting::format_elapsed(secs as u64)
            }
            None => String::new(),
        }
    }

    /// `true` when the last update is older than `threshold`.
    ///
    /// Records without a parseable `updated_at` are never stale.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.updated_age(now)
            .map(|age| age > threshold)
            .unwrap_or(false)
    }

    /// Age of the last update, or `None` when `updated_at` is absent.
    pub fn updated_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let updated = self.updated_at?;
        (now - updated.with_timezone(&Utc)).to_std().ok()
    }
}

/// Project label used when a state file omits one.
pub const DEFAULT_PROJECT: &str = "unknown";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs_ago: i64, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        Some((now - chrono::Duration::seconds(secs_ago)).fixed_offset())
    }

    #[test]
    fn test_status_from_wire() {
        assert_eq!(SessionStatus::from_wire("starting"), SessionStatus::Starting);
        assert_eq!(SessionStatus::from_wire("working"), SessionStatus::Working);
        assert_eq!(SessionStatus::from_wire("done"), SessionStatus::Done);
        assert_eq!(SessionStatus::from_wire("attention"), SessionStatus::Attention);
        assert_eq!(SessionStatus::from_wire("Working"), SessionStatus::Unknown);
        assert_eq!(SessionStatus::from_wire(""), SessionStatus::Unknown);
    }

    #[test]
    fn test_status_presentation_is_always_known() {
        assert_eq!(SessionStatus::Unknown.presentation(), SessionStatus::Starting);
        assert_eq!(SessionStatus::Done.presentation(), SessionStatus::Done);
    }

    #[test]
    fn test_terminal_kind_wire_mapping() {
        assert_eq!(TerminalKind::from_wire("terminal"), TerminalKind::Device);
        assert_eq!(TerminalKind::from_wire("iterm2"), TerminalKind::Window);
        assert_eq!(TerminalKind::from_wire("warp"), TerminalKind::Unknown);
        assert_eq!(TerminalKind::Unknown.as_str(), "");
    }

    #[test]
    fn test_tty_name_strips_dev_prefix() {
        let mut r = SessionRecord::new("a");
        r.terminal = TerminalKind::Device;
        r.terminal_session_id = "/dev/ttys001".to_string();
        assert_eq!(r.tty_name(), Some("ttys001"));

        r.terminal_session_id = "pts/3".to_string();
        assert_eq!(r.tty_name(), Some("pts/3"));
    }

    #[test]
    fn test_tty_name_none_for_window_kind() {
        let mut r = SessionRecord::new("a");
        r.terminal = TerminalKind::Window;
        r.terminal_session_id = "w0t1p0:ABC".to_string();
        assert_eq!(r.tty_name(), None);
    }

    #[test]
    fn test_elapsed() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut r = SessionRecord::new("a");
        assert_eq!(r.elapsed(now), "");

        r.started_at = at(45, now);
        assert_eq!(r.elapsed(now), "45s");
        r.started_at = at(12 * 60 + 5, now);
        assert_eq!(r.elapsed(now), "12m");
        r.started_at = at(2 * 3600 + 5 * 60, now);
        assert_eq!(r.elapsed(now), "2h 5m");
    }

    #[test]
    fn test_is_stale() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ten_min = Duration::from_secs(600);
        let mut r = SessionRecord::new("a");
        assert!(!r.is_stale(now, ten_min), "no timestamp is never stale");

        r.updated_at = at(60, now);
        assert!(!r.is_stale(now, ten_min));

        r.updated_at = at(601, now);
        assert!(r.is_stale(now, ten_min));
    }
}
