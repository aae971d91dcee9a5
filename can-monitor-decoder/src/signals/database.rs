//! Unified signal database
//!
//! Combines message definitions from DBC and converted JSON symbol files into a
//! single queryable database.

use crate::types::CanId;
use std::collections::HashMap;

/// Highest precision derived from a scaling factor
const MAX_DECIMAL_PLACES: u8 = 6;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: CanId,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC/JSON filename)
    pub source: String,
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Enumeration labels keyed by integral physical value
    pub value_table: Option<HashMap<i64, String>>,
    /// Display precision; `None` shows the value as an integer
    pub decimal_places: Option<u8>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// Number of decimals needed to show values produced by `factor` and `offset`.
///
/// Integral scaling yields `None` (integer display).
pub fn decimal_places_for(factor: f64, offset: f64) -> Option<u8> {
    let places = fraction_digits(factor).max(fraction_digits(offset));
    if places == 0 {
        None
    } else {
        Some(places)
    }
}

fn fraction_digits(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    // Shortest round-trip representation, e.g. 0.1 -> "0.1"
    let text = format!("{}", value.abs());
    match text.split_once('.') {
        Some((_, fraction)) => (fraction.len() as u8).min(MAX_DECIMAL_PLACES),
        None => 0,
    }
}

/// The unified signal database
pub struct SignalDatabase {
    /// All message definitions by CAN ID
    /// Key: CAN ID, Value: List of messages with that ID (can be multiple from different files)
    messages: HashMap<CanId, Vec<MessageDefinition>>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    /// Add a message definition to the database
    pub fn add_message(&mut self, message: MessageDefinition) {
        let can_id = message.id;

        if self.messages.contains_key(&can_id) {
            log::warn!(
                "Duplicate definition for {} ({}), keeping the first one",
                can_id,
                message.source
            );
        }

        self.messages.entry(can_id).or_default().push(message);
    }

    /// Get a specific message definition (first one found for given CAN ID)
    pub fn get_message(&self, can_id: CanId) -> Option<&MessageDefinition> {
        self.messages.get(&can_id).and_then(|msgs| msgs.first())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages: usize = self.messages.values().map(|v| v.len()).sum();
        let num_signals: usize = self
            .messages
            .values()
            .flat_map(|msgs| msgs.iter())
            .map(|msg| msg.signals.len())
            .sum();

        DatabaseStats {
            num_messages,
            num_signals,
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}
