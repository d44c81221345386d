//! Main TUI application state and logic

use crate::scenario::Session;
use crate::sandbox::errors::SandboxError;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

use super::panes::{HeapRenderData, StatusRenderData};

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Script,
    Bindings,
    Heap,
    Terminal,
}

impl FocusedPane {
    /// Move focus to the next pane (clockwise: script -> terminal -> bindings -> heap)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Script => FocusedPane::Terminal,
            FocusedPane::Terminal => FocusedPane::Bindings,
            FocusedPane::Bindings => FocusedPane::Heap,
            FocusedPane::Heap => FocusedPane::Script,
        }
    }

    /// Move focus to the previous pane (counter-clockwise)
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Script => FocusedPane::Heap,
            FocusedPane::Terminal => FocusedPane::Script,
            FocusedPane::Bindings => FocusedPane::Terminal,
            FocusedPane::Heap => FocusedPane::Bindings,
        }
    }
}

/// The main application state
pub struct App {
    /// The finished scenario run being viewed
    pub session: Session,

    /// Currently focused pane
    pub focused_pane: FocusedPane,

    /// Per-pane scroll offsets
    pub bindings_scroll: usize,
    pub heap_scroll: usize,
    pub terminal_scroll: usize,

    /// Target visual row for the current script line (None = not initialized yet)
    pub target_line_row: Option<usize>,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,

    /// Whether auto-play mode is active
    pub is_playing: bool,

    /// Last time a step was taken in play mode
    pub last_play_time: Instant,

    /// Last time space was pressed (for debouncing)
    pub last_space_press: Instant,
}

impl App {
    pub fn new(session: Session) -> Self {
        let now = Instant::now();
        App {
            session,
            focused_pane: FocusedPane::Script,
            bindings_scroll: 0,
            heap_scroll: 0,
            terminal_scroll: 0,
            target_line_row: None,
            should_quit: false,
            status_message: String::from("Ready!"),
            is_playing: false,
            last_play_time: now,
            last_space_press: now.checked_sub(Duration::from_secs(1)).unwrap_or(now),
        }
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if self.is_playing && self.last_play_time.elapsed() >= Duration::from_secs(1) {
                if self.session.step_forward().is_ok() {
                    self.status_message = "Playing...".to_string();
                    self.terminal_scroll = usize::MAX;
                } else {
                    self.is_playing = false;
                    self.status_message = "Playback complete".to_string();
                }
                self.last_play_time = Instant::now();
            }

            // Poll with a timeout so auto-play keeps ticking
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // 4 panes in 2 columns, plus status bar at bottom
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(main_chunks[0]);

        // Left column: Script (top) | Terminal (bottom)
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(columns[0]);

        // Right column: Bindings (top) | Heap (bottom)
        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(columns[1]);

        let scenario = self.session.scenario();
        let script: Vec<&str> = scenario
            .steps()
            .iter()
            .map(|step| step.source.as_str())
            .collect();

        let Some(snapshot) = self.session.current() else {
            return;
        };
        let is_error = snapshot.error.is_some();

        super::panes::render_script_pane(
            frame,
            left_rows[0],
            &scenario.title,
            &script,
            snapshot.step,
            is_error,
            self.focused_pane == FocusedPane::Script,
            &mut self.target_line_row,
        );

        super::panes::render_terminal_pane(
            frame,
            left_rows[1],
            &snapshot.terminal,
            snapshot.step,
            self.focused_pane == FocusedPane::Terminal,
            &mut self.terminal_scroll,
        );

        super::panes::render_bindings_pane(
            frame,
            right_rows[0],
            &snapshot.bindings,
            &snapshot.heap,
            self.focused_pane == FocusedPane::Bindings,
            &mut self.bindings_scroll,
        );

        // Classes only accumulate, so the final registry describes every snapshot
        super::panes::render_heap_pane(
            frame,
            right_rows[1],
            HeapRenderData {
                heap: &snapshot.heap,
                registry: self.session.sandbox().registry(),
                leaked: &snapshot.leaked,
            },
            self.focused_pane == FocusedPane::Heap,
            &mut self.heap_scroll,
        );

        let error_message = snapshot.error.as_ref().map(|err| format!("Error: {}", err));
        super::panes::render_status_bar(
            frame,
            main_chunks[1],
            StatusRenderData {
                message: error_message.as_deref().unwrap_or(&self.status_message),
                position: self.session.history_position(),
                total: self.session.total_snapshots(),
                is_error,
                is_playing: self.is_playing,
            },
        );
    }

    /// Handle keyboard events
    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            // Number keys step forward N times directly
            KeyCode::Char(c @ '1'..='9') => {
                self.is_playing = false;
                let n = c.to_digit(10).unwrap_or(1) as usize;
                let mut stepped = 0;
                for _ in 0..n {
                    if self.session.step_forward().is_err() {
                        break;
                    }
                    stepped += 1;
                }
                self.status_message = format!("Stepped forward {} step(s)", stepped);
                self.terminal_scroll = usize::MAX;
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => {
                self.is_playing = false;
                self.step_backward();
            }
            KeyCode::Right => {
                self.is_playing = false;
                self.step_forward();
            }
            KeyCode::Up => match self.focused_pane {
                FocusedPane::Script => {
                    // Scrolling up makes the current line move down visually
                    if let Some(row) = self.target_line_row {
                        self.target_line_row = Some(row.saturating_add(1));
                    }
                }
                FocusedPane::Bindings => {
                    self.bindings_scroll = self.bindings_scroll.saturating_sub(1);
                }
                FocusedPane::Heap => {
                    self.heap_scroll = self.heap_scroll.saturating_sub(1);
                }
                FocusedPane::Terminal => {
                    self.terminal_scroll = self.terminal_scroll.saturating_sub(1);
                }
            },
            KeyCode::Down => match self.focused_pane {
                FocusedPane::Script => {
                    if let Some(row) = self.target_line_row {
                        self.target_line_row = Some(row.saturating_sub(1));
                    }
                }
                FocusedPane::Bindings => {
                    self.bindings_scroll = self.bindings_scroll.saturating_add(1);
                }
                FocusedPane::Heap => {
                    self.heap_scroll = self.heap_scroll.saturating_add(1);
                }
                FocusedPane::Terminal => {
                    self.terminal_scroll = self.terminal_scroll.saturating_add(1);
                }
            },
            KeyCode::Char(' ') => {
                // 200ms debounce against key repeat
                if self.last_space_press.elapsed() >= Duration::from_millis(200) {
                    let now = Instant::now();
                    self.last_space_press = now;
                    self.is_playing = !self.is_playing;
                    if self.is_playing {
                        self.last_play_time = now.checked_sub(Duration::from_secs(1)).unwrap_or(now);
                        self.status_message = "Playing...".to_string();
                    } else {
                        self.status_message = "Paused".to_string();
                    }
                }
            }
            KeyCode::Enter => {
                self.is_playing = false;
                let result = self.session.jump_to_end().map(|()| "Jumped to end");
                self.report(result);
            }
            KeyCode::Backspace => {
                self.is_playing = false;
                let result = self.session.rewind_to_start().map(|()| "Jumped to start");
                self.report(result);
            }
            _ => {}
        }
    }

    fn step_forward(&mut self) {
        let result = self.session.step_forward().map(|()| "Stepped forward");
        self.report(result);
    }

    fn step_backward(&mut self) {
        let result = self.session.step_backward().map(|()| "Stepped backward");
        self.report(result);
    }

    fn report(&mut self, result: Result<&str, SandboxError>) {
        match result {
            Ok(message) => {
                self.status_message = message.to_string();
                // Auto-scroll terminal to bottom
                self.terminal_scroll = usize::MAX;
            }
            Err(SandboxError::HistoryOperationFailed { message }) => {
                self.status_message = message;
            }
            Err(err) => {
                self.status_message = format!("Error: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::scenario::library;
    use crossterm::event::KeyModifiers;

    fn app() -> App {
        let scenario = library::find("smart-pointers").unwrap();
        let mut session = Session::new(scenario, &SandboxConfig::default());
        session.run().unwrap();
        session.rewind_to_start().unwrap();
        App::new(session)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_focus_cycles_through_all_panes() {
        let mut pane = FocusedPane::Script;
        for _ in 0..4 {
            assert_eq!(pane.next().prev(), pane);
            pane = pane.next();
        }
        assert_eq!(pane, FocusedPane::Script);
    }

    #[test]
    fn test_keys_move_through_history() {
        let mut app = app();
        press(&mut app, KeyCode::Left);
        assert_eq!(app.session.history_position(), 0);
        assert!(app.status_message.contains("beginning"));

        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.session.history_position(), 3);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.history_position(), app.session.total_snapshots() - 1);

        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.session.history_position(), 0);

        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
