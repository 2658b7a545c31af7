//! Main application state and TUI event loop for the session monitor.
//!
//! [`App`] owns the theme, the selection, and the last received session
//! snapshot. Key presses become [`Action`]s that are carried out against the
//! running [`SessionHandle`].

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};

use monitor_core::models::SessionRecord;
use monitor_runtime::{SessionHandle, SessionSnapshot, SharedSnapshot};

use crate::session_list::{self, SessionListView};
use crate::themes::Theme;

// ── Action ────────────────────────────────────────────────────────────────────

/// What a key press asks the event loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Discover,
    Prune,
    Kill(String),
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Root application state for the session monitor TUI.
pub struct App {
    /// Active colour theme.
    pub theme: Theme,
    /// Directory shown in the header.
    pub sessions_dir: String,
    /// Quiet time after which a session gets the stale marker.
    pub stale_threshold: Duration,
    /// Index into the current snapshot.
    pub selected: Option<usize>,
    /// Session awaiting kill confirmation.
    pub pending_kill: Option<String>,
    /// Feedback from the last action.
    pub status_message: Option<String>,
    /// `true` when `status_message` reports a failure.
    pub status_is_error: bool,
    /// Set to `true` to break out of the event loop on the next iteration.
    pub should_quit: bool,
    /// Most recent published view.
    pub snapshot: SharedSnapshot,
}

impl App {
    pub fn new(theme_name: &str, sessions_dir: String, stale_threshold: Duration) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            sessions_dir,
            stale_threshold,
            selected: None,
            pending_kill: None,
            status_message: None,
            status_is_error: false,
            should_quit: false,
            snapshot: Arc::new(SessionSnapshot::empty()),
        }
    }

    // ── State updates ─────────────────────────────────────────────────────────

    /// Replace the view, keeping the cursor on the same session when it
    /// survived the refresh.
    pub fn update_snapshot(&mut self, snapshot: SharedSnapshot) {
        let previous_id = self.selected_session().map(|s| s.session_id.clone());
        let fallback = self.selected.unwrap_or(0);
        self.snapshot = snapshot;

        let sessions = &self.snapshot.sessions;
        self.selected = if sessions.is_empty() {
            None
        } else {
            previous_id
                .and_then(|id| sessions.iter().position(|s| s.session_id == id))
                .or(Some(fallback.min(sessions.len() - 1)))
        };

        let kill_target_gone = self
            .pending_kill
            .as_ref()
            .is_some_and(|id| !sessions.iter().any(|s| &s.session_id == id));
        if kill_target_gone {
            self.pending_kill = None;
        }
    }

    pub fn selected_session(&self) -> Option<&SessionRecord> {
        self.selected.and_then(|i| self.snapshot.sessions.get(i))
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.snapshot.sessions.len();
        if len == 0 {
            self.selected = None;
            return;
        }
        let current = self.selected.unwrap_or(0) as isize;
        self.selected = Some((current + delta).clamp(0, len as isize - 1) as usize);
    }

    /// Translate a key press into an [`Action`].
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.kind == KeyEventKind::Release {
            return Action::None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }

        if let Some(id) = self.pending_kill.take() {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::Kill(id),
                _ => {
                    self.set_status("kill cancelled", false);
                    Action::None
                }
            };
        }

        self.status_message = None;
        self.status_is_error = false;
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                Action::None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                Action::None
            }
            KeyCode::Char('d') => Action::Discover,
            KeyCode::Char('p') => Action::Prune,
            KeyCode::Char('x') => {
                if let Some(session) = self.selected_session() {
                    let prompt = format!("kill {} ({})? y/n", session.project, session.session_id);
                    self.pending_kill = Some(session.session_id.clone());
                    self.set_status(prompt, false);
                }
                Action::None
            }
            _ => Action::None,
        }
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the interactive TUI against a running orchestrator.
    ///
    /// Uses `crossterm::event::poll` with a short timeout so key handling and
    /// view updates interleave on the current task. Exits on `q`, `Esc`, or
    /// `Ctrl+C`, or when the view channel closes.
    pub async fn run(mut self, handle: &SessionHandle) -> io::Result<()> {
        let mut rx = handle.subscribe();
        self.update_snapshot(Arc::clone(&rx.borrow_and_update()));

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(100);

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }

            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        let action = self.handle_key(key);
                        self.perform(action, handle).await;
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            match rx.has_changed() {
                Ok(true) => {
                    let snapshot = Arc::clone(&rx.borrow_and_update());
                    self.update_snapshot(snapshot);
                }
                Ok(false) => {}
                Err(_) => {
                    tracing::debug!("session view closed; leaving UI");
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break Ok(());
            }
        };

        // Restore terminal state unconditionally.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Show `message` in the footer, styled as a failure when `is_error`.
    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some(message.into());
        self.status_is_error = is_error;
    }

    async fn perform(&mut self, action: Action, handle: &SessionHandle) {
        match action {
            Action::None => {}
            Action::Quit => self.should_quit = true,
            Action::Discover => match handle.discover().await {
                Ok(report) if report.created.is_empty() => {
                    self.set_status("no untracked sessions found", false)
                }
                Ok(report) => self.set_status(
                    format!("discovered {} session(s)", report.created.len()),
                    false,
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "discovery failed");
                    self.set_status(format!("discovery failed: {e}"), true);
                }
            },
            Action::Prune => match handle.prune_now().await {
                Ok(report) if report.query_failed => self.set_status("liveness query failed", true),
                Ok(report) => {
                    self.set_status(format!("pruned {} session(s)", report.removed.len()), false)
                }
                Err(e) => self.set_status(format!("prune failed: {e}"), true),
            },
            Action::Kill(id) => match handle.kill(&id).await {
                Ok(true) => self.set_status(format!("terminating {id}"), false),
                Ok(false) => self.set_status(format!("{id} is already gone"), false),
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "kill failed");
                    self.set_status(format!("kill failed: {e}"), true);
                }
            },
        }
    }

    /// Render the current application state into `frame`.
    pub fn render(&self, frame: &mut Frame) {
        let view = SessionListView {
            sessions: &self.snapshot.sessions,
            selected: self.selected,
            now: chrono::Utc::now(),
            stale_threshold: self.stale_threshold,
            sessions_dir: &self.sessions_dir,
            status_message: self.status_message.as_deref(),
            status_is_error: self.status_is_error,
        };
        session_list::render_session_list(frame, frame.area(), &view, &self.theme);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
