//! CAN Monitor
//!
//! Live terminal view of a CAN bus. A background thread receives frames from
//! SocketCAN, decodes them with `can-monitor-decoder` and keeps the latest state
//! of every identifier; the main thread renders that state on a fixed tick and
//! handles keys.

pub mod config;
pub mod ingest;
pub mod render;
pub mod report;
pub mod spinner;
pub mod state;
pub mod terminal;
pub mod transport;
pub mod view;
