//! Core types for the CAN monitor decoder library
//!
//! This module defines the frame representation handed over by a bus transport,
//! the decoded output of the decoder, and the error types. The decoder is stateless:
//! it turns one frame into one decoded message and keeps no history.

use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Bit 31 marks an extended identifier in DBC files and raw socket ids
pub const EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Largest 11-bit identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Mask for a 29-bit identifier
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// A CAN arbitration identifier together with its addressing range.
///
/// Standard and extended identifiers with the same numeric value are distinct
/// keys. Ordering is by numeric id first, standard before extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanId {
    /// Numeric identifier (11-bit or 29-bit)
    pub id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub extended: bool,
}

impl CanId {
    /// Create a standard (11-bit) identifier
    pub fn standard(id: u32) -> Self {
        Self { id, extended: false }
    }

    /// Create an extended (29-bit) identifier
    pub fn extended(id: u32) -> Self {
        Self {
            id: id & EXTENDED_ID_MASK,
            extended: true,
        }
    }

    /// Interpret a raw identifier where bit 31 carries the extended flag
    pub fn from_raw(raw: u32) -> Self {
        if raw & EXTENDED_ID_FLAG != 0 {
            Self::extended(raw)
        } else {
            Self::standard(raw)
        }
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{:08X}", self.id)
        } else {
            write!(f, "0x{:03X}", self.id)
        }
    }
}

/// Raw CAN frame as received from a bus interface
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// Declared data length (0-8 for classic CAN, up to 64 for CAN-FD)
    pub dlc: u8,
    /// Frame data bytes
    pub data: Vec<u8>,
    /// True if this is a CAN-FD frame
    pub is_fd: bool,
    /// True if this is a remote frame
    pub is_remote_frame: bool,
}

impl CanFrame {
    /// Build a classic data frame; the DLC is taken from the payload length
    pub fn new(can_id: CanId, data: &[u8]) -> Self {
        Self {
            can_id: can_id.id,
            is_extended: can_id.extended,
            dlc: data.len().min(u8::MAX as usize) as u8,
            data: data.to_vec(),
            is_fd: false,
            is_remote_frame: false,
        }
    }

    /// Identifier key of this frame
    pub fn key(&self) -> CanId {
        CanId {
            id: self.can_id,
            extended: self.is_extended,
        }
    }
}

/// Errors that can occur while loading a symbol database
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Failed to parse JSON database: {0}")]
    JsonParseError(String),

    #[error("DBC to JSON conversion failed: {0}")]
    ConverterError(String),

    #[error("Unsupported database format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Why a single frame could not be decoded.
///
/// This is a normal per-frame outcome, not a fault: callers keep the raw
/// frame and carry on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("Message not found: CAN ID {0}")]
    NotFound(CanId),

    #[error("Length mismatch for {id}: database expects {expected} bytes, frame has {actual}")]
    LengthMismatch {
        id: CanId,
        expected: usize,
        actual: usize,
    },
}

/// A successfully decoded CAN message
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// CAN message ID
    pub can_id: CanId,
    /// Message name from the symbol database
    pub name: String,
    /// Decoded signals, in database declaration order
    pub signals: Vec<DecodedSignal>,
}

/// A decoded signal with its current value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the symbol database
    pub name: String,
    /// Physical value (offset + factor * raw)
    pub value: SignalValue,
    /// Raw bit-field value before scaling
    pub raw_value: i64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Enumeration label matching the value, if any
    pub value_description: Option<String>,
    /// Digits after the decimal point; `None` displays as an integer
    pub decimal_places: Option<u8>,
}

impl DecodedSignal {
    /// Text shown for this signal: the enumeration label when one matched,
    /// otherwise the value at the signal's precision
    pub fn display_value(&self) -> String {
        match &self.value_description {
            Some(label) => label.clone(),
            None => self.value.format_with(self.decimal_places),
        }
    }
}

/// Signal value types supported by the decoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    /// Signed integer value (no scaling applied)
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
        }
    }

    /// Integer form of the value, only when it has no fractional part
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            SignalValue::Integer(v) => Some(*v),
            SignalValue::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Format with a fixed number of decimals, or as an integer when `None`
    pub fn format_with(&self, decimal_places: Option<u8>) -> String {
        match (self, decimal_places) {
            (SignalValue::Integer(v), None) => v.to_string(),
            (value, Some(places)) => format!("{:.*}", places as usize, value.as_f64()),
            (SignalValue::Float(v), None) => format!("{:.0}", v),
        }
    }
}
