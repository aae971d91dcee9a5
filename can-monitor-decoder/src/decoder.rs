//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct is the entry point for loading signal definitions and
//! decoding frames received from a bus.

use crate::message_decoder::MessageDecoder;
use crate::signals::SignalDatabase;
use crate::types::{CanId, DecodeFailure, DecodedMessage, DecoderError, Result};
use std::path::Path;
use std::process::Command;

/// The main decoder struct - entry point for all decoding operations
///
/// Read-only once loaded, so a single instance can be shared between threads.
pub struct Decoder {
    /// Internal signal database (loaded from DBC/JSON files)
    signal_db: SignalDatabase,
}

impl Decoder {
    /// Create a new decoder instance
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Create a decoder from one database file, picking the loader by extension
    ///
    /// # Example
    /// ```no_run
    /// use can_monitor_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::from_path(Path::new("powertrain.dbc")).unwrap();
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut decoder = Self::new();
        decoder.add_database(path)?;
        Ok(decoder)
    }

    /// Load a database file (`.dbc` or `.json`) into the signal database
    pub fn add_database(&mut self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("dbc") => self.add_dbc(path),
            Some("json") => self.add_json(path),
            _ => Err(DecoderError::UnsupportedFormat(format!(
                "{:?} (expected .dbc or .json)",
                path
            ))),
        }
    }

    /// Load a DBC file and add its definitions to the signal database
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Load a JSON symbol file and add its definitions to the signal database
    pub fn add_json(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading JSON database: {:?}", path);

        let messages = crate::signals::json::parse_json_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("JSON database loaded successfully: {:?}", path);
        Ok(())
    }

    /// Convert a DBC file with an external converter and load its JSON output
    ///
    /// `converter` is a command line (program followed by arguments); the DBC
    /// path is appended as the last argument and the JSON is read from stdout.
    pub fn add_converted_dbc(&mut self, converter: &str, path: &Path) -> Result<()> {
        let mut parts = converter.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            DecoderError::ConverterError("empty converter command".to_string())
        })?;

        log::info!("Converting {:?} with '{}'", path, converter);

        let output = Command::new(program)
            .args(parts)
            .arg(path)
            .output()
            .map_err(|e| {
                DecoderError::ConverterError(format!("failed to run '{}': {}", program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecoderError::ConverterError(format!(
                "'{}' exited with {}: {}",
                converter,
                output.status,
                stderr.trim()
            )));
        }

        let json = String::from_utf8(output.stdout).map_err(|e| {
            DecoderError::ConverterError(format!("converter output is not UTF-8: {}", e))
        })?;

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("converted.dbc");
        let messages = crate::signals::json::parse_json_str(&json, source)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("Converted database loaded successfully: {:?}", path);
        Ok(())
    }

    /// Decode one frame
    ///
    /// Unknown identifiers and frames whose length differs from the database
    /// definition are reported as a [`DecodeFailure`]; callers are expected to
    /// keep the raw frame.
    pub fn decode(
        &self,
        can_id: CanId,
        dlc: usize,
        data: &[u8],
    ) -> std::result::Result<DecodedMessage, DecodeFailure> {
        let message_def = self
            .signal_db
            .get_message(can_id)
            .ok_or(DecodeFailure::NotFound(can_id))?;

        if message_def.size != dlc {
            return Err(DecodeFailure::LengthMismatch {
                id: can_id,
                expected: message_def.size,
                actual: dlc,
            });
        }

        Ok(MessageDecoder::decode_message(can_id, data, message_def))
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;
