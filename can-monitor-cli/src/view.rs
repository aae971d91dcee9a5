//! Interactive view state and key handling
//!
//! [`ViewState`] belongs to the render loop. Keys are applied one per tick;
//! the only state that leaves this module is the pause flag, mirrored into the
//! shared [`PauseGate`] read by the ingestion thread.

use crate::ingest::PauseGate;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Rows used by the title bar, header and status bar
pub const CHROME_ROWS: u16 = 6;

/// One input, already mapped to what it does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Quit,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    Home,
    End,
    PauseToggle,
    SignalsToggle,
    BoldToggle,
    Clear,
    Resize { cols: u16, rows: u16 },
    /// A key with no binding, kept for the status line
    Unbound(String),
}

impl Key {
    /// Map a terminal event. Releases, repeats of non-key events and mouse
    /// input map to `None`.
    pub fn from_event(event: &Event) -> Option<Key> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(Self::from_key_event(key)),
            Event::Resize(cols, rows) => Some(Key::Resize {
                cols: *cols,
                rows: *rows,
            }),
            _ => None,
        }
    }

    fn from_key_event(key: &KeyEvent) -> Key {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Key::Quit;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Key::Quit,
            KeyCode::Down | KeyCode::Char('j') => Key::ScrollDown,
            KeyCode::Up | KeyCode::Char('k') => Key::ScrollUp,
            KeyCode::PageDown | KeyCode::Right | KeyCode::Char(' ') => Key::PageDown,
            KeyCode::PageUp | KeyCode::Left => Key::PageUp,
            KeyCode::Home | KeyCode::Char('g') => Key::Home,
            KeyCode::End | KeyCode::Char('G') => Key::End,
            KeyCode::Char('p') => Key::PauseToggle,
            KeyCode::Char('s') => Key::SignalsToggle,
            KeyCode::Char('b') => Key::BoldToggle,
            KeyCode::Char('c') => Key::Clear,
            KeyCode::Char(c) => Key::Unbound(format!("'{}'", c)),
            KeyCode::F(n) => Key::Unbound(format!("F{}", n)),
            other => Key::Unbound(format!("{:?}", other)),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Quit => write!(f, "quit"),
            Key::ScrollDown => write!(f, "down"),
            Key::ScrollUp => write!(f, "up"),
            Key::PageDown => write!(f, "page down"),
            Key::PageUp => write!(f, "page up"),
            Key::Home => write!(f, "home"),
            Key::End => write!(f, "end"),
            Key::PauseToggle => write!(f, "pause"),
            Key::SignalsToggle => write!(f, "signals"),
            Key::BoldToggle => write!(f, "bold"),
            Key::Clear => write!(f, "clear"),
            Key::Resize { cols, rows } => write!(f, "resize {}x{}", cols, rows),
            Key::Unbound(name) => write!(f, "{}", name),
        }
    }
}

/// Ingestion mode as seen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Running,
    Paused,
}

/// What the render loop should do after a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Quit,
}

/// Interactive state of one terminal session
pub struct ViewState {
    pub scroll_offset: usize,
    pub show_signals: bool,
    pub bold: bool,
    pub pending_clear: bool,
    pub epoch_start: Instant,
    pub last_key: String,
    pub cols: u16,
    pub rows: u16,
    mode: Mode,
    layout_dirty: bool,
    pause: Arc<PauseGate>,
}

impl ViewState {
    pub fn new(pause: Arc<PauseGate>, cols: u16, rows: u16) -> Self {
        Self {
            scroll_offset: 0,
            show_signals: true,
            bold: false,
            pending_clear: false,
            epoch_start: Instant::now(),
            last_key: "-".to_string(),
            cols,
            rows,
            mode: if pause.is_paused() {
                Mode::Paused
            } else {
                Mode::Running
            },
            layout_dirty: true,
            pause,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_paused(&self) -> bool {
        self.mode == Mode::Paused
    }

    /// Rows available to the scrollable body
    pub fn viewport_height(&self) -> usize {
        self.rows.saturating_sub(CHROME_ROWS).max(1) as usize
    }

    pub fn max_offset(&self, content_height: usize) -> usize {
        content_height.saturating_sub(self.viewport_height())
    }

    /// Keep the scroll offset inside `[0, max_offset]`
    pub fn clamp_scroll(&mut self, content_height: usize) {
        self.scroll_offset = self.scroll_offset.min(self.max_offset(content_height));
    }

    /// True once after anything that changes the global layout
    pub fn take_layout_dirty(&mut self) -> bool {
        std::mem::take(&mut self.layout_dirty)
    }

    /// Apply at most one key for this tick
    pub fn apply(&mut self, key: Option<Key>, content_height: usize) -> Transition {
        let Some(key) = key else {
            self.last_key = "-".to_string();
            return Transition::Continue;
        };

        self.last_key = key.to_string();
        let page = self.viewport_height();

        match key {
            Key::Quit => return Transition::Quit,
            Key::ScrollDown => self.scroll_offset = self.scroll_offset.saturating_add(1),
            Key::ScrollUp => self.scroll_offset = self.scroll_offset.saturating_sub(1),
            Key::PageDown => self.scroll_offset = self.scroll_offset.saturating_add(page),
            Key::PageUp => self.scroll_offset = self.scroll_offset.saturating_sub(page),
            Key::Home => self.scroll_offset = 0,
            Key::End => self.scroll_offset = self.max_offset(content_height),
            Key::PauseToggle => {
                self.mode = match self.mode {
                    Mode::Running => Mode::Paused,
                    Mode::Paused => Mode::Running,
                };
                self.pause.set_paused(self.mode == Mode::Paused);
            }
            Key::SignalsToggle => {
                self.show_signals = !self.show_signals;
                self.layout_dirty = true;
            }
            Key::BoldToggle => {
                self.bold = !self.bold;
                self.layout_dirty = true;
            }
            Key::Clear => self.pending_clear = true,
            Key::Resize { cols, rows } => {
                self.cols = cols;
                self.rows = rows;
                self.layout_dirty = true;
            }
            Key::Unbound(_) => {}
        }

        self.clamp_scroll(content_height);
        Transition::Continue
    }
}
