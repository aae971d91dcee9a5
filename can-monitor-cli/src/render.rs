//! Main-thread render loop
//!
//! Every tick: wait up to one tick for a key, take a snapshot of the store,
//! apply the key, honor a pending clear, format and repaint. The loop ends on
//! quit, on SIGINT/SIGTERM, or when the ingestion thread has stopped.

use crate::ingest::IngestionHandle;
use crate::report;
use crate::spinner::SpinnerSequence;
use crate::state::{MessageRecord, MessageStore};
use crate::terminal::{Frame, Painter};
use crate::transport::TransportError;
use crate::view::{Key, Transition, ViewState};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use crossterm::event;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why the render loop ended
#[derive(Debug)]
pub enum ExitReason {
    /// The quit key was pressed
    Quit,
    /// SIGINT or SIGTERM
    Interrupted,
    /// The ingestion thread stopped on a transport error
    IngestionFailed(TransportError),
}

/// Fixed facts about the session shown in the title bar
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub channel: String,
    pub db_messages: usize,
    /// Wall-clock start, reset on clear
    pub started: DateTime<Local>,
}

impl SessionInfo {
    pub fn new(channel: impl Into<String>, db_messages: usize) -> Self {
        Self {
            channel: channel.into(),
            db_messages,
            started: Local::now(),
        }
    }
}

pub struct RenderLoop<W: Write> {
    store: Arc<MessageStore>,
    view: ViewState,
    spinner: SpinnerSequence,
    painter: Painter<W>,
    session: SessionInfo,
    tick: Duration,
    header: [String; 2],
    shutdown: Arc<AtomicBool>,
    ingestion: Option<IngestionHandle>,
    content_height: usize,
}

impl<W: Write> RenderLoop<W> {
    pub fn new(
        store: Arc<MessageStore>,
        view: ViewState,
        spinner: SpinnerSequence,
        painter: Painter<W>,
        session: SessionInfo,
        tick: Duration,
    ) -> Self {
        Self {
            store,
            view,
            spinner,
            painter,
            session,
            tick,
            header: report::header_lines(),
            shutdown: Arc::new(AtomicBool::new(false)),
            ingestion: None,
            content_height: 0,
        }
    }

    /// Stop when `flag` is raised (registered with signal-hook)
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// End the loop once this ingestion thread has stopped
    pub fn watch_ingestion(mut self, handle: IngestionHandle) -> Self {
        self.ingestion = Some(handle);
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn into_painter(self) -> Painter<W> {
        self.painter
    }

    /// Run until quit, interrupt or ingestion failure
    pub fn run(&mut self) -> Result<ExitReason> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Interrupted");
                return Ok(ExitReason::Interrupted);
            }

            if let Some(reason) = self.check_ingestion()? {
                return Ok(reason);
            }

            let key = poll_key(self.tick)?;
            if self.step(key)? == Transition::Quit {
                return Ok(ExitReason::Quit);
            }
        }
    }

    /// `Some` once the ingestion thread has finished
    pub fn check_ingestion(&mut self) -> Result<Option<ExitReason>> {
        if !self.ingestion.as_ref().is_some_and(|h| h.is_finished()) {
            return Ok(None);
        }

        let Some(handle) = self.ingestion.take() else {
            return Ok(None);
        };
        match handle.join() {
            Ok(Err(e)) => Ok(Some(ExitReason::IngestionFailed(e))),
            Ok(Ok(never)) => match never {},
            Err(_) => Err(anyhow!("Ingestion thread panicked")),
        }
    }

    /// One tick after the key (if any) has been read
    pub fn step(&mut self, key: Option<Key>) -> io::Result<Transition> {
        let mut snapshot = self.store.snapshot();
        let mut body = self.format(&mut snapshot.records);

        if self.view.apply(key, body.len()) == Transition::Quit {
            return Ok(Transition::Quit);
        }

        let mut full = self.view.take_layout_dirty();

        if self.view.pending_clear {
            self.store.clear();
            self.view.epoch_start = Instant::now();
            self.view.pending_clear = false;
            self.session.started = Local::now();
            log::debug!("Cleared message store");

            snapshot = self.store.snapshot();
            full = true;
        }

        if full {
            body = self.format(&mut snapshot.records);
        }

        let viewport = self.view.viewport_height();
        if body.len() < self.content_height && body.len() < viewport {
            full = true;
        }
        self.content_height = body.len();
        self.view.clamp_scroll(body.len());

        let title = report::title_line(
            &self.session.channel,
            self.session.db_messages,
            self.session.started,
            self.view.epoch_start.elapsed(),
            snapshot.total_frames,
        );
        let status = report::status_line(
            self.spinner.tick(snapshot.total_frames),
            &self.view,
            body.len(),
        );

        let frame = Frame {
            title: &title,
            header: &self.header,
            body: &body,
            status: &status,
            scroll_offset: self.view.scroll_offset,
            bold: self.view.bold,
            full,
        };
        self.painter.paint(&frame, self.view.cols, self.view.rows)?;

        Ok(Transition::Continue)
    }

    fn format(&self, records: &mut [MessageRecord]) -> Vec<report::Line> {
        for record in records.iter_mut() {
            record.show_signals = self.view.show_signals;
        }
        report::format_body(records)
    }
}

/// Wait up to `timeout` for one input event
fn poll_key(timeout: Duration) -> io::Result<Option<Key>> {
    if event::poll(timeout)? {
        Ok(Key::from_event(&event::read()?))
    } else {
        Ok(None)
    }
}
