//! JSON symbol database loader
//!
//! Loads the structured form of a DBC file as produced by an external DBC to JSON
//! converter. Layout:
//!
//! ```json
//! {
//!   "messages": {
//!     "2016": {
//!       "name": "EngineTemps",
//!       "length": 8,
//!       "signals": {
//!         "Temp": { "bit_start": 0, "length": 8, "little_endian": 1,
//!                   "factor": 0.1, "offset": 0, "unit": "C" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Message keys are decimal or `0x`-prefixed hex ids. Flags accept either
//! booleans or 0/1 integers. Signals keep the order they are declared in.

use crate::signals::database::{
    decimal_places_for, ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition,
    ValueType,
};
use crate::types::{CanId, DecoderError, Result, EXTENDED_ID_FLAG, MAX_STANDARD_ID};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct JsonDatabase {
    messages: HashMap<String, JsonMessage>,
}

#[derive(Debug, Deserialize)]
struct JsonMessage {
    name: String,
    #[serde(alias = "size", alias = "dlc")]
    length: usize,
    #[serde(default)]
    extended: Option<Flag>,
    /// Kept as a raw map so declaration order survives (`preserve_order`)
    #[serde(default)]
    signals: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonSignal {
    #[serde(alias = "start_bit")]
    bit_start: u16,
    length: u16,
    #[serde(default = "Flag::yes")]
    little_endian: Flag,
    #[serde(default)]
    signed: Flag,
    #[serde(default = "default_factor")]
    factor: f64,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    enums: Option<HashMap<String, String>>,
    #[serde(default)]
    decimals: Option<u8>,
    /// True for the multiplexer (switch) signal
    #[serde(default)]
    multiplexer: Flag,
    /// Multiplexer values for which this signal is present
    #[serde(default)]
    multiplexed_by: Option<Vec<u64>>,
}

fn default_factor() -> f64 {
    1.0
}

/// A boolean written either as `true`/`false` or as `1`/`0`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn yes() -> Self {
        Flag::Bool(true)
    }

    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

impl Default for Flag {
    fn default() -> Self {
        Flag::Bool(false)
    }
}

/// Parse a JSON symbol file and return message definitions
pub fn parse_json_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing JSON database: {:?}", path);

    let content = std::fs::read_to_string(path).map_err(|e| {
        DecoderError::JsonParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.json")
        .to_string();

    let messages = parse_json_str(&content, &source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse JSON symbol content held in memory
pub fn parse_json_str(content: &str, source: &str) -> Result<Vec<MessageDefinition>> {
    let database: JsonDatabase = serde_json::from_str(content)
        .map_err(|e| DecoderError::JsonParseError(format!("{}: {}", source, e)))?;

    let mut messages = database
        .messages
        .into_iter()
        .map(|(key, message)| convert_message(&key, message, source))
        .collect::<Result<Vec<_>>>()?;

    messages.sort_by_key(|m| m.id);
    Ok(messages)
}

fn parse_message_key(key: &str) -> Option<u32> {
    let key = key.trim();
    match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    }
}

fn convert_message(key: &str, message: JsonMessage, source: &str) -> Result<MessageDefinition> {
    let raw_id = parse_message_key(key).ok_or_else(|| {
        DecoderError::JsonParseError(format!("{}: invalid message id '{}'", source, key))
    })?;

    // Without an explicit flag, ids beyond the 11-bit range are extended
    let extended = match message.extended {
        Some(flag) => flag.is_set(),
        None => raw_id & EXTENDED_ID_FLAG != 0 || raw_id > MAX_STANDARD_ID,
    };
    let id = if extended {
        CanId::extended(raw_id)
    } else {
        CanId::standard(raw_id)
    };

    let mut declared = Vec::with_capacity(message.signals.len());
    for (name, value) in message.signals {
        match serde_json::from_value::<JsonSignal>(value) {
            Ok(signal) => declared.push((name, signal)),
            Err(e) => {
                return Err(DecoderError::JsonParseError(format!(
                    "{}: signal '{}' in message '{}': {}",
                    source, name, message.name, e
                )))
            }
        }
    }

    let multiplexer_signal = declared
        .iter()
        .find(|(_, s)| s.multiplexer.is_set())
        .map(|(name, _)| name.clone());

    let signals = declared
        .into_iter()
        .map(|(name, signal)| convert_signal(name, signal, multiplexer_signal.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let is_multiplexed =
        multiplexer_signal.is_some() || signals.iter().any(|s| s.multiplexer_info.is_some());

    Ok(MessageDefinition {
        id,
        name: message.name,
        size: message.length,
        signals,
        is_multiplexed,
        multiplexer_signal,
        source: source.to_string(),
    })
}

fn convert_signal(
    name: String,
    signal: JsonSignal,
    multiplexer_signal_name: Option<&str>,
) -> Result<SignalDefinition> {
    if signal.length == 0 || signal.length > 64 {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "Signal '{}' has invalid length {}",
            name, signal.length
        )));
    }

    let value_table = signal.enums.map(|enums| {
        enums
            .into_iter()
            .filter_map(|(key, label)| match key.trim().parse::<i64>() {
                Ok(value) => Some((value, label)),
                Err(_) => {
                    log::warn!("Ignoring non-integer enum key '{}' on signal {}", key, name);
                    None
                }
            })
            .collect::<HashMap<i64, String>>()
    });

    let multiplexer_info = match signal.multiplexed_by {
        Some(values) => {
            let multiplexer_signal = multiplexer_signal_name.ok_or_else(|| {
                DecoderError::InvalidSignalDefinition(format!(
                    "Multiplexed signal '{}' but no multiplexer found",
                    name
                ))
            })?;
            Some(MultiplexerInfo {
                multiplexer_signal: multiplexer_signal.to_string(),
                multiplexer_values: values,
            })
        }
        None => None,
    };

    Ok(SignalDefinition {
        start_bit: signal.bit_start,
        length: signal.length,
        byte_order: if signal.little_endian.is_set() {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        },
        value_type: if signal.signed.is_set() {
            ValueType::Signed
        } else {
            ValueType::Unsigned
        },
        factor: signal.factor,
        offset: signal.offset,
        unit: signal.unit.filter(|u| !u.is_empty()),
        value_table,
        decimal_places: signal
            .decimals
            .or_else(|| decimal_places_for(signal.factor, signal.offset)),
        multiplexer_info,
        name,
    })
}
