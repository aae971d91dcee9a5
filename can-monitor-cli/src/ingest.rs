//! Frame ingestion
//!
//! [`IngestionLoop`] owns the transport and runs on its own thread: receive one
//! frame, decode it, upsert the result. While the [`PauseGate`] is closed it
//! parks instead of receiving. The time spent parked is handed to the store and
//! left out of the next inter-arrival time of every record.

use crate::state::{FrameUpdate, MessageStore};
use crate::transport::{Transport, TransportError};
use can_monitor_decoder::{CanFrame, Decoder};
use parking_lot::{Condvar, Mutex};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Join handle of a spawned ingestion thread
pub type IngestionHandle = JoinHandle<Result<Infallible, TransportError>>;

/// Longest time a paused ingestion thread sleeps before re-checking the flag
pub const PAUSE_RECHECK: Duration = Duration::from_millis(100);

/// Pause flag shared by the render loop (writer) and the ingestion thread (reader).
///
/// The flag itself is an atomic so checking it never contends with the store
/// lock. The mutex/condvar pair only parks the ingestion thread while paused.
pub struct PauseGate {
    paused: AtomicBool,
    lock: Mutex<()>,
    resumed: Condvar,
}

impl PauseGate {
    pub fn new(paused: bool) -> Self {
        Self {
            paused: AtomicBool::new(paused),
            lock: Mutex::new(()),
            resumed: Condvar::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        let _guard = self.lock.lock();
        self.paused.store(paused, Ordering::Release);
        if !paused {
            self.resumed.notify_all();
        }
    }

    /// Block while paused. Returns how long the caller was parked.
    pub fn wait_while_paused(&self) -> Duration {
        if !self.is_paused() {
            return Duration::ZERO;
        }

        let parked = Instant::now();
        let mut guard = self.lock.lock();
        while self.is_paused() {
            // Bounded so a missed wakeup costs at most one recheck interval
            self.resumed.wait_for(&mut guard, PAUSE_RECHECK);
        }
        parked.elapsed()
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Receive → decode → upsert loop
pub struct IngestionLoop {
    store: Arc<MessageStore>,
    decoder: Arc<Decoder>,
    pause: Arc<PauseGate>,
}

impl IngestionLoop {
    pub fn new(store: Arc<MessageStore>, decoder: Arc<Decoder>, pause: Arc<PauseGate>) -> Self {
        Self {
            store,
            decoder,
            pause,
        }
    }

    /// Run until the transport fails. Never returns `Ok`.
    pub fn run<T: Transport>(&self, mut transport: T) -> Result<Infallible, TransportError> {
        loop {
            let paused_for = self.pause.wait_while_paused();
            if !paused_for.is_zero() {
                log::debug!("Resumed after {:?}", paused_for);
                self.store.exclude_pause(paused_for);
            }

            let frame = match transport.receive() {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Ingestion stopped: {}", e);
                    return Err(e);
                }
            };

            self.ingest(frame);
        }
    }

    /// Decode one frame and store the outcome
    pub fn ingest(&self, frame: CanFrame) {
        let update = self.decode(frame);
        self.store.upsert(update);
    }

    fn decode(&self, frame: CanFrame) -> FrameUpdate {
        let key = frame.key();

        if frame.is_remote_frame {
            return FrameUpdate::placeholder(key, frame.dlc, frame.data);
        }

        // Unknown ids and length mismatches are normal; keep the raw frame
        match self.decoder.decode(key, frame.dlc as usize, &frame.data) {
            Ok(message) => FrameUpdate::decoded(message, frame.dlc, frame.data),
            Err(_) => FrameUpdate::placeholder(key, frame.dlc, frame.data),
        }
    }

    /// Start the loop on a named background thread
    pub fn spawn<T: Transport + 'static>(
        self,
        transport: T,
    ) -> std::io::Result<IngestionHandle> {
        thread::Builder::new()
            .name("can-ingest".to_string())
            .spawn(move || self.run(transport))
    }
}
