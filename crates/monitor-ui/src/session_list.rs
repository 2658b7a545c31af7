//! Session list view.
//!
//! Renders the published session view as a ranked table: status, project,
//! elapsed time, terminal, and the last prompt. Sessions whose writer has
//! gone quiet past the staleness threshold carry a marker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use monitor_core::formatting::truncate_line;
use monitor_core::models::{SessionRecord, SessionStatus, TerminalKind};

use crate::components::header::Header;
use crate::themes::Theme;

/// Width reserved for the prompt column when the area is too narrow to tell.
const MIN_PROMPT_WIDTH: usize = 16;
const STALE_MARKER: &str = "⏸";

/// Everything needed to draw one frame of the list.
pub struct SessionListView<'a> {
    pub sessions: &'a [SessionRecord],
    pub selected: Option<usize>,
    pub now: DateTime<Utc>,
    pub stale_threshold: Duration,
    pub sessions_dir: &'a str,
    /// One-line feedback from the last action, shown in the footer.
    pub status_message: Option<&'a str>,
    /// Draw `status_message` in the error style.
    pub status_is_error: bool,
}

// ── Cell helpers ──────────────────────────────────────────────────────────────

/// Single-column glyph for a status, after presentation mapping.
pub fn status_icon(status: SessionStatus) -> &'static str {
    match status.presentation() {
        SessionStatus::Attention => "!",
        SessionStatus::Working => "●",
        SessionStatus::Done => "✓",
        _ => "○",
    }
}

/// Short description of where the session lives.
pub fn terminal_label(record: &SessionRecord) -> String {
    match (record.terminal, record.tty_name()) {
        (_, Some(tty)) => tty.to_string(),
        (TerminalKind::Window, None) => "window".to_string(),
        _ => "-".to_string(),
    }
}

/// Cut `s` to at most `max_width` display columns, ending in `…` when cut.
///
/// Wide characters (CJK, most emoji) count as two columns.
pub fn fit_width(s: &str, max_width: usize) -> String {
    let flat = truncate_line(s, usize::MAX);
    let total: usize = flat.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max_width {
        return flat;
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Plain-text rows for non-interactive output, one per session.
pub fn plain_lines(
    sessions: &[SessionRecord],
    now: DateTime<Utc>,
    stale_threshold: Duration,
    prompt_width: usize,
) -> Vec<String> {
    sessions
        .iter()
        .map(|s| {
            let stale = if s.is_stale(now, stale_threshold) {
                " (stale)"
            } else {
                ""
            };
            format!(
                "{} {:<9} {:<24} {:>7}  {:<10} {}{}",
                status_icon(s.status),
                s.status.presentation().as_str(),
                fit_width(&s.project, 24),
                s.elapsed(now),
                terminal_label(s),
                fit_width(&s.last_prompt, prompt_width),
                stale
            )
        })
        .collect()
}

// ── Render ────────────────────────────────────────────────────────────────────

pub fn render_session_list(frame: &mut Frame, area: Rect, view: &SessionListView, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Header::new(view.sessions.len(), view.sessions_dir, theme);
    frame.render_widget(Paragraph::new(Text::from(header.to_lines())), chunks[0]);

    if view.sessions.is_empty() {
        render_no_sessions(frame, chunks[1], theme);
    } else {
        let prompt_width = (chunks[1].width as usize)
            .saturating_sub(2 + 12 + 24 + 8 + 10 + 8)
            .max(MIN_PROMPT_WIDTH);
        let rows: Vec<Row> = view
            .sessions
            .iter()
            .enumerate()
            .map(|(i, s)| session_row(s, i, view, prompt_width, theme))
            .collect();

        let widths = [
            Constraint::Length(12),
            Constraint::Length(24),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(MIN_PROMPT_WIDTH as u16),
        ];
        let table = Table::new(rows, widths)
            .header(
                Row::new(["STATUS", "PROJECT", "ELAPSED", "TERMINAL", "LAST PROMPT"])
                    .style(theme.table_header),
            )
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.table_border),
            )
            .row_highlight_style(theme.table_selected);

        let mut state = TableState::default().with_selected(view.selected);
        frame.render_stateful_widget(table, chunks[1], &mut state);
    }

    frame.render_widget(Paragraph::new(footer_line(view, theme)), chunks[2]);
}

fn session_row<'a>(
    s: &'a SessionRecord,
    index: usize,
    view: &SessionListView,
    prompt_width: usize,
    theme: &Theme,
) -> Row<'a> {
    let status_style = theme.status_style(s.status);
    let mut elapsed = vec![Span::raw(s.elapsed(view.now))];
    if s.is_stale(view.now, view.stale_threshold) {
        elapsed.push(Span::styled(format!(" {STALE_MARKER}"), theme.stale));
    }

    Row::new(vec![
        Cell::from(Line::from(vec![
            Span::styled(status_icon(s.status), status_style),
            Span::raw(" "),
            Span::styled(s.status.presentation().as_str(), status_style),
        ])),
        Cell::from(fit_width(&s.project, 24)),
        Cell::from(Line::from(elapsed)),
        Cell::from(terminal_label(s)),
        Cell::from(Span::styled(fit_width(&s.last_prompt, prompt_width), theme.dim)),
    ])
    .style(theme.row_style(index))
}

fn footer_line<'a>(view: &'a SessionListView, theme: &Theme) -> Line<'a> {
    if let Some(message) = view.status_message {
        let style = if view.status_is_error {
            theme.error
        } else {
            theme.info
        };
        return Line::from(Span::styled(message, style));
    }
    Line::from(vec![
        Span::styled("q", theme.value),
        Span::styled(" quit  ", theme.dim),
        Span::styled("j/k", theme.value),
        Span::styled(" move  ", theme.dim),
        Span::styled("d", theme.value),
        Span::styled(" discover  ", theme.dim),
        Span::styled("p", theme.value),
        Span::styled(" prune  ", theme.dim),
        Span::styled("x", theme.value),
        Span::styled(" kill", theme.dim),
    ])
}

/// Placeholder shown while the directory holds no sessions.
pub fn render_no_sessions(frame: &mut Frame, area: Rect, theme: &Theme) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("No active sessions", theme.value)),
        Line::from(Span::styled(
            "Sessions appear here when an agent writes its state file, or press d to discover running agents.",
            theme.dim,
        )),
    ];
    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.table_border),
    );
    frame.render_widget(paragraph, area);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ratatui::{backend::TestBackend, Terminal};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn record(id: &str, status: SessionStatus, started_mins_ago: i64) -> SessionRecord {
        let mut r = SessionRecord::new(id);
        r.status = status;
        r.project = format!("proj-{id}");
        r.terminal = TerminalKind::Device;
        r.terminal_session_id = "/dev/ttys001".to_string();
        let started = (now() - chrono::Duration::minutes(started_mins_ago)).fixed_offset();
        r.started_at = Some(started);
        r.updated_at = Some(started);
        r.last_prompt = "fix the flaky test".to_string();
        r
    }

    fn view<'a>(sessions: &'a [SessionRecord], selected: Option<usize>) -> SessionListView<'a> {
        SessionListView {
            sessions,
            selected,
            now: now(),
            stale_threshold: Duration::from_secs(600),
            sessions_dir: "/tmp/sessions",
            status_message: None,
            status_is_error: false,
        }
    }

    fn draw(view: &SessionListView) -> String {
        let backend = TestBackend::new(120, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        terminal
            .draw(|frame| render_session_list(frame, frame.area(), view, &theme))
            .unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_status_icon_maps_unknown_to_starting() {
        assert_eq!(status_icon(SessionStatus::Unknown), status_icon(SessionStatus::Starting));
        assert_eq!(status_icon(SessionStatus::Attention), "!");
        assert_eq!(status_icon(SessionStatus::Done), "✓");
    }

    #[test]
    fn test_terminal_label() {
        let mut r = SessionRecord::new("a");
        assert_eq!(terminal_label(&r), "-");
        r.terminal = TerminalKind::Window;
        r.terminal_session_id = "w0t0p0:X".to_string();
        assert_eq!(terminal_label(&r), "window");
        r.terminal = TerminalKind::Device;
        r.terminal_session_id = "/dev/pts/3".to_string();
        assert_eq!(terminal_label(&r), "pts/3");
    }

    #[test]
    fn test_fit_width_ascii() {
        assert_eq!(fit_width("hello", 10), "hello");
        assert_eq!(fit_width("hello world", 6), "hello…");
        assert_eq!(fit_width("abc", 0), "");
    }

    #[test]
    fn test_fit_width_counts_wide_chars() {
        // Each CJK char is two columns wide.
        assert_eq!(fit_width("日本語テキスト", 7), "日本語…");
    }

    #[test]
    fn test_fit_width_folds_newlines() {
        assert_eq!(fit_width("line one\nline two", 40), "line one line two");
    }

    #[test]
    fn test_plain_lines_marks_stale() {
        let mut fresh = record("a", SessionStatus::Working, 5);
        fresh.updated_at = Some((now() - chrono::Duration::minutes(1)).fixed_offset());
        let stale = record("b", SessionStatus::Attention, 60);

        let lines = plain_lines(&[fresh, stale], now(), Duration::from_secs(600), 40);
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].contains("(stale)"));
        assert!(lines[0].contains("working"));
        assert!(lines[0].contains("5m"));
        assert!(lines[1].contains("(stale)"));
        assert!(lines[1].contains("attention"));
    }

    #[test]
    fn test_render_session_list_shows_rows() {
        let sessions = vec![
            record("a", SessionStatus::Attention, 3),
            record("b", SessionStatus::Working, 30),
        ];
        let out = draw(&view(&sessions, Some(0)));
        assert!(out.contains("AGENT SESSION MONITOR"));
        assert!(out.contains("2 sessions"));
        assert!(out.contains("proj-a"));
        assert!(out.contains("proj-b"));
        assert!(out.contains("ttys001"));
        assert!(out.contains("LAST PROMPT"));
    }

    #[test]
    fn test_render_empty_list_shows_placeholder() {
        let out = draw(&view(&[], None));
        assert!(out.contains("No active sessions"));
    }

    #[test]
    fn test_render_footer_prefers_status_message() {
        let sessions = vec![record("a", SessionStatus::Done, 1)];
        let mut v = view(&sessions, None);
        v.status_message = Some("discovered 2 sessions");
        let out = draw(&v);
        assert!(out.contains("discovered 2 sessions"));
        assert!(!out.contains("discover  "));
    }

    /// Foreground colour of the first cell of `needle` in the rendered frame.
    fn fg_of(view: &SessionListView, theme: &Theme, needle: &str) -> Option<ratatui::style::Color> {
        let backend = TestBackend::new(120, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render_session_list(frame, frame.area(), view, theme))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        for (y, row) in buffer.content.chunks(width).enumerate() {
            let text: String = row.iter().map(|c| c.symbol()).collect();
            if let Some(x) = text.find(needle) {
                let col = text[..x].chars().count();
                return buffer.cell((col as u16, y as u16)).and_then(|c| c.style().fg);
            }
        }
        None
    }

    #[test]
    fn test_render_footer_styles_failures_as_errors() {
        let sessions = vec![record("a", SessionStatus::Done, 1)];
        let theme = Theme::dark();
        let mut v = view(&sessions, None);
        v.status_message = Some("kill failed: pkill not found");
        v.status_is_error = true;
        assert_eq!(fg_of(&v, &theme, "kill failed"), theme.error.fg);

        v.status_message = Some("pruned 1 session(s)");
        v.status_is_error = false;
        assert_eq!(fg_of(&v, &theme, "pruned 1"), theme.info.fg);
    }

    #[test]
    fn test_render_narrow_terminal_does_not_panic() {
        let sessions = vec![record("a", SessionStatus::Starting, 1)];
        let backend = TestBackend::new(30, 8);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::light();
        let v = view(&sessions, Some(0));
        terminal
            .draw(|frame| render_session_list(frame, frame.area(), &v, &theme))
            .unwrap();
    }
}
