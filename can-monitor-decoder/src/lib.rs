//! CAN Monitor Decoder Library
//!
//! A stateless, reusable library for decoding live CAN frames with signal
//! definitions from DBC files or their converted JSON form.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Loads symbol databases (DBC natively, JSON from external converters)
//! - Decodes one frame at a time into named, scaled, enumerated signals
//! - Handles Intel/Motorola byte order, signed values and multiplexed signals
//!
//! The library does NOT:
//! - Talk to a bus
//! - Keep per-identifier state between frames
//! - Render anything
//!
//! All higher-level functionality is in the application layer (can-monitor-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use can_monitor_decoder::{CanId, Decoder};
//! use std::path::Path;
//!
//! let decoder = Decoder::from_path(Path::new("powertrain.dbc")).unwrap();
//!
//! match decoder.decode(CanId::standard(0x7E0), 8, &[0x64, 0, 0, 0, 0, 0, 0, 0]) {
//!     Ok(message) => {
//!         for signal in &message.signals {
//!             println!("{} = {}", signal.name, signal.display_value());
//!         }
//!     }
//!     Err(failure) => eprintln!("Not decoded: {}", failure),
//! }
//! ```

// Public modules
pub mod decoder;
pub mod types;

// Re-export main types for convenience
pub use decoder::{DatabaseStats, Decoder};
pub use types::{
    CanFrame, CanId, DecodeFailure, DecodedMessage, DecodedSignal, DecoderError, Result,
    SignalValue,
};

// Internal modules (not exposed in public API)
mod message_decoder;
mod signals;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
