//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN frames based on signal definitions
//! from the signal database. Handles bit extraction, endianness, multiplexing,
//! physical value conversion and enumeration labels.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{CanId, DecodedMessage, DecodedSignal, SignalValue};

/// Message decoder - extracts signals from CAN frames
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode frame data into a DecodedMessage
    ///
    /// The caller has already checked the frame length against the definition.
    /// Signals that do not fit the data, or whose multiplexer value is not
    /// active, are left out.
    pub fn decode_message(
        can_id: CanId,
        data: &[u8],
        message_def: &MessageDefinition,
    ) -> DecodedMessage {
        let mut decoded_signals = Vec::with_capacity(message_def.signals.len());
        let mut multiplexer_value: Option<u64> = None;

        // For multiplexed messages, first extract the multiplexer signal value
        if message_def.is_multiplexed {
            if let Some(ref mux_signal_name) = message_def.multiplexer_signal {
                if let Some(mux_signal) = message_def
                    .signals
                    .iter()
                    .find(|s| s.name == *mux_signal_name)
                {
                    if let Some(value) = Self::extract_signal_value(data, mux_signal) {
                        multiplexer_value = Some(value as u64);
                    }
                }
            }
        }

        // Decode all signals (non-multiplexed and applicable multiplexed ones)
        for signal in &message_def.signals {
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                    _ => continue,
                }
            }

            if let Some(decoded) = Self::decode_signal(data, signal) {
                decoded_signals.push(decoded);
            }
        }

        DecodedMessage {
            can_id,
            name: message_def.name.clone(),
            signals: decoded_signals,
        }
    }

    /// Decode a single signal from CAN frame data
    fn decode_signal(data: &[u8], signal: &SignalDefinition) -> Option<DecodedSignal> {
        let raw_value = Self::extract_signal_value(data, signal)?;

        // Apply physical value conversion (factor and offset)
        let value = if signal.factor != 1.0 || signal.offset != 0.0 {
            SignalValue::Float(signal.offset + signal.factor * (raw_value as f64))
        } else {
            SignalValue::Integer(raw_value)
        };

        // Enumerations match on the integral physical value only
        let value_description = signal.value_table.as_ref().and_then(|table| {
            value
                .as_integral()
                .and_then(|key| table.get(&key))
                .cloned()
        });

        Some(DecodedSignal {
            name: signal.name.clone(),
            value,
            raw_value,
            unit: signal.unit.clone(),
            value_description,
            decimal_places: signal.decimal_places,
        })
    }

    /// Extract raw signal value from CAN frame data
    ///
    /// Handles bit extraction with proper endianness support.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        if length == 0 || length > 64 {
            return None;
        }

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length)?,
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length)?,
        };

        // Apply sign extension if needed
        let value = match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        };

        Some(value)
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// Start bit points to the LSB; bits are numbered LSB first within each byte.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        if start_bit + length > data.len() * 8 {
            log::trace!(
                "Signal at bit {} (len {}) exceeds {} data bytes",
                start_bit,
                length,
                data.len()
            );
            return None;
        }

        let mut result: u64 = 0;
        for i in 0..length {
            let bit_pos = start_bit + i;
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result |= (bit_value as u64) << i;
        }

        Some(result)
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// DBC convention: the start bit addresses the signal's MSB using the same
    /// per-byte numbering as Intel signals (bit 7 is the MSB of byte 0). The
    /// signal continues towards lower bits and wraps to bit 7 of the next byte.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let mut result: u64 = 0;
        let mut bit_pos = start_bit;

        for i in 0..length {
            let byte_idx = bit_pos / 8;
            if byte_idx >= data.len() {
                log::trace!(
                    "Motorola signal at bit {} (len {}) exceeds {} data bytes",
                    start_bit,
                    length,
                    data.len()
                );
                return None;
            }

            let bit_value = (data[byte_idx] >> (bit_pos % 8)) & 0x01;
            result = (result << 1) | bit_value as u64;

            if i + 1 < length {
                bit_pos = if bit_pos % 8 == 0 { bit_pos + 15 } else { bit_pos - 1 };
            }
        }

        Some(result)
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s.
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
