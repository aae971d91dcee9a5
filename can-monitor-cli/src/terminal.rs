//! Terminal lifecycle and painting
//!
//! [`TerminalGuard`] puts the terminal into raw mode on the alternate screen and
//! puts it back on drop, on panic, or when [`restore`] is called. [`Painter`]
//! draws one dashboard frame with queued crossterm commands.

use crate::report::{Line, LineKind};
use crate::view::CHROME_ROWS;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, ExecutableCommand, QueueableCommand};
use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// Set while raw mode and the alternate screen are active
static TERMINAL_ACTIVE: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK: Once = Once::new();

/// First body row on screen: title, blank line and the two header lines
const BODY_TOP: u16 = 4;

/// Raw mode + alternate screen for the lifetime of the guard
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        TERMINAL_ACTIVE.store(true, Ordering::SeqCst);

        // Restore before the panic message is printed so it stays readable
        PANIC_HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                restore();
                previous(info);
            }));
        });

        let guard = Self { _private: () };
        let mut stdout = io::stdout();
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(guard)
    }

    /// Current terminal size as (columns, rows)
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore();
    }
}

/// Leave the alternate screen and raw mode. Safe to call more than once.
pub fn restore() {
    if TERMINAL_ACTIVE.swap(false, Ordering::SeqCst) {
        let mut stdout = io::stdout();
        let _ = stdout.execute(cursor::Show);
        let _ = stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = stdout.flush();
    }
}

/// Everything drawn in one tick
pub struct Frame<'a> {
    pub title: &'a str,
    pub header: &'a [String; 2],
    pub body: &'a [Line],
    pub status: &'a str,
    pub scroll_offset: usize,
    pub bold: bool,
    /// Clear the whole screen first and redraw the header
    pub full: bool,
}

/// Draws frames to any writer; stdout in the application
pub struct Painter<W: Write> {
    out: W,
}

impl<W: Write> Painter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn paint(&mut self, frame: &Frame<'_>, cols: u16, rows: u16) -> io::Result<()> {
        let width = cols as usize;

        if frame.full {
            self.out.queue(terminal::Clear(ClearType::All))?;
            for (i, line) in frame.header.iter().enumerate() {
                self.out.queue(cursor::MoveTo(0, 2 + i as u16))?;
                if frame.bold {
                    self.out.queue(SetAttribute(Attribute::Bold))?;
                }
                self.out.queue(Print(clip(line, width)))?;
                if frame.bold {
                    self.out.queue(SetAttribute(Attribute::Reset))?;
                }
            }
        }

        self.bar(0, frame.title, width)?;

        let viewport = rows.saturating_sub(CHROME_ROWS).max(1);
        for row in 0..viewport {
            self.out.queue(cursor::MoveTo(0, BODY_TOP + row))?;
            if let Some(line) = frame.body.get(frame.scroll_offset + row as usize) {
                let bold = frame.bold && line.kind == LineKind::Message;
                if bold {
                    self.out.queue(SetAttribute(Attribute::Bold))?;
                }
                self.out.queue(Print(clip(&line.text, width)))?;
                if bold {
                    self.out.queue(SetAttribute(Attribute::Reset))?;
                }
            }
            self.out.queue(terminal::Clear(ClearType::UntilNewLine))?;
        }

        self.bar(rows.saturating_sub(1), frame.status, width)?;
        self.out.flush()
    }

    /// Reverse-video bar across the full width
    fn bar(&mut self, row: u16, text: &str, width: usize) -> io::Result<()> {
        self.out.queue(cursor::MoveTo(0, row))?;
        self.out.queue(SetAttribute(Attribute::Reverse))?;
        self.out.queue(Print(format!("{:<width$}", clip(text, width), width = width)))?;
        self.out.queue(SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}

/// At most `width` characters of `text`
fn clip(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
