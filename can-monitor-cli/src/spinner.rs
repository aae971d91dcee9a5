//! Liveness spinner shown in the status bar

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Glyph sequences the spinner can cycle through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpinnerStyle {
    #[default]
    Line,
    Dots,
    Arrows,
    Blocks,
}

impl SpinnerStyle {
    fn glyphs(self) -> &'static [&'static str] {
        match self {
            SpinnerStyle::Line => &["|", "/", "-", "\\"],
            SpinnerStyle::Dots => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
            SpinnerStyle::Arrows => &["←", "↖", "↑", "↗", "→", "↘", "↓", "↙"],
            SpinnerStyle::Blocks => &["▖", "▘", "▝", "▗"],
        }
    }

    fn interval(self) -> Duration {
        match self {
            SpinnerStyle::Dots => Duration::from_millis(80),
            _ => Duration::from_millis(130),
        }
    }
}

/// Animation clock fed by the frame counter.
///
/// The glyph moves on at most once per style interval, and only when the total
/// frame count changed since the last step. A quiet bus leaves it frozen.
#[derive(Debug, Clone)]
pub struct SpinnerSequence {
    glyphs: &'static [&'static str],
    interval: Duration,
    step: usize,
    last_step: Instant,
    last_total: u64,
}

impl SpinnerSequence {
    pub fn new(style: SpinnerStyle) -> Self {
        Self::starting_at(style, Instant::now())
    }

    pub fn starting_at(style: SpinnerStyle, started: Instant) -> Self {
        Self {
            glyphs: style.glyphs(),
            interval: style.interval(),
            step: 0,
            last_step: started,
            last_total: 0,
        }
    }

    /// Glyph for the current time and frame count
    pub fn tick(&mut self, total_frames: u64) -> &'static str {
        self.tick_at(total_frames, Instant::now())
    }

    pub fn tick_at(&mut self, total_frames: u64, now: Instant) -> &'static str {
        let due = now.saturating_duration_since(self.last_step) >= self.interval;
        if total_frames != self.last_total && due {
            self.step = (self.step + 1) % self.glyphs.len();
            self.last_step = now;
            self.last_total = total_frames;
        }
        self.glyph()
    }

    /// Glyph currently shown
    pub fn glyph(&self) -> &'static str {
        self.glyphs[self.step]
    }
}
