use crate::themes::Theme;
use ratatui::text::{Line, Span};

/// Decorative sparkle string placed either side of the application title.
pub const SPARKLES: &str = "✦ ✧ ✦ ✧";

/// Session monitor header rendering four lines:
///
/// 1. Application title with sparkle decorations (ALL CAPS).
/// 2. A 60-column `=` separator.
/// 3. Session count and directory in `[ N sessions | dir ]` format.
/// 4. An empty line.
pub struct Header<'a> {
    /// Number of sessions in the current view.
    pub session_count: usize,
    /// Directory the view is read from.
    pub sessions_dir: &'a str,
    /// Theme providing colour styles for each part of the header.
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(session_count: usize, sessions_dir: &'a str, theme: &'a Theme) -> Self {
        Self {
            session_count,
            sessions_dir,
            theme,
        }
    }

    /// Render the header as a `Vec<Line>` containing exactly four lines.
    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);
        let noun = if self.session_count == 1 {
            "session"
        } else {
            "sessions"
        };

        vec![
            Line::from(vec![
                Span::styled(SPARKLES, self.theme.header_sparkle),
                Span::styled(" AGENT SESSION MONITOR ", self.theme.header),
                Span::styled(SPARKLES, self.theme.header_sparkle),
            ]),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(format!("{} {noun}", self.session_count), self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(self.sessions_dir, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            Line::from(""),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
