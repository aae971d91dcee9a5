//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{
    decimal_places_for, ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition,
    ValueType,
};
use crate::types::{CanId, DecoderError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let messages = parse_dbc_bytes(&bytes, &source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC content held in memory
pub fn parse_dbc_bytes(bytes: &[u8], source: &str) -> Result<Vec<MessageDefinition>> {
    // Try UTF-8 first, then fallback to Latin-1/Windows-1252 encoding
    let dbc_content = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::warn!("DBC file {} is not UTF-8, trying Latin-1 encoding", source);
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    // Parse using can-dbc crate
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC file {}: {:?}", source, e))
    })?;

    dbc.messages()
        .iter()
        .map(|dbc_msg| convert_message(&dbc, dbc_msg, source))
        .collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let mut is_multiplexed = false;
    let mut multiplexor: Option<&str> = None;
    let mut nested_multiplexor: Option<&str> = None;

    // First pass: identify multiplexer signal. A plain `M` switch wins over an
    // `m<k>M` one, wherever it is declared.
    for dbc_sig in dbc_msg.signals() {
        match dbc_sig.multiplexer_indicator() {
            can_dbc::MultiplexIndicator::Multiplexor => {
                is_multiplexed = true;
                multiplexor = multiplexor.or(Some(dbc_sig.name().as_str()));
            }
            can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(_) => {
                is_multiplexed = true;
                nested_multiplexor = nested_multiplexor.or(Some(dbc_sig.name().as_str()));
            }
            can_dbc::MultiplexIndicator::MultiplexedSignal(_) => {
                is_multiplexed = true;
            }
            can_dbc::MultiplexIndicator::Plain => {}
        }
    }
    let multiplexer_signal_name = multiplexor.or(nested_multiplexor).map(str::to_string);

    // Second pass: convert all signals
    let raw_id = dbc_msg.message_id().0;
    let mut signals = Vec::with_capacity(dbc_msg.signals().len());
    for dbc_sig in dbc_msg.signals() {
        let value_descriptions =
            dbc.value_descriptions_for_signal(can_dbc::MessageId(raw_id), dbc_sig.name());
        let signal = convert_signal(
            dbc_sig,
            multiplexer_signal_name.as_deref(),
            value_descriptions,
        )?;
        signals.push(signal);
    }

    Ok(MessageDefinition {
        // Bit 31 of the raw DBC id flags an extended frame
        id: CanId::from_raw(raw_id),
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
    value_descriptions: Option<&[can_dbc::ValDescription]>,
) -> Result<SignalDefinition> {
    // Determine byte order
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    // Determine value type
    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let factor = *dbc_sig.factor();
    let offset = *dbc_sig.offset();

    // VAL_ entries are keyed by raw value; re-key them by physical value
    let value_table = value_descriptions.map(|descriptions| {
        descriptions
            .iter()
            .filter_map(|desc| {
                let physical = offset + factor * *desc.a();
                if physical.is_finite() && physical.fract() == 0.0 {
                    Some((physical as i64, desc.b().to_string()))
                } else {
                    None
                }
            })
            .collect::<HashMap<i64, String>>()
    });

    // Handle multiplexer information
    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value)
        | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(switch_value) => {
            let multiplexer_signal = multiplexer_signal_name
                .filter(|name| *name != dbc_sig.name())
                .ok_or_else(|| {
                    DecoderError::InvalidSignalDefinition(format!(
                        "Multiplexed signal '{}' but no multiplexer found",
                        dbc_sig.name()
                    ))
                })?;
            Some(MultiplexerInfo {
                multiplexer_signal: multiplexer_signal.to_string(),
                multiplexer_values: vec![switch_value],
            })
        }
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor,
        offset,
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        value_table,
        decimal_places: decimal_places_for(factor, offset),
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const POWERTRAIN_DBC: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    CAT_DEF_
    CAT_
    FILTER
    BA_DEF_DEF_
    EV_DATA_
    ENVVAR_DATA_
    SGTYPE_
    SGTYPE_VAL_
    BA_DEF_SGTYPE_
    BA_SGTYPE_
    SIG_TYPE_REF_
    VAL_TABLE_
    SIG_GROUP_
    SIG_VALTYPE_
    SIGTYPE_VALTYPE_
    BO_TX_BU_
    BA_DEF_REL_
    BA_REL_
    BA_SGTYPE_REL_
    SG_MUL_VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 0|16@1+ (0.01,0) [0|16] "V" ECU2

BO_ 2566844672 TransmissionStatus: 8 ECU2
 SG_ Gear : 0|4@1+ (1,0) [0|15] "" ECU1

VAL_ 2566844672 Gear 0 "PARK" 1 "DRIVE" ;
"#;

    #[test]
    fn test_parse_simple_dbc() {
        // Write to temporary file
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(POWERTRAIN_DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        // Parse the file
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        // Verify results
        assert_eq!(messages.len(), 3);

        // Check first message
        let msg1 = &messages[0];
        assert_eq!(msg1.id, CanId::standard(291));
        assert_eq!(msg1.name, "EngineData");
        assert_eq!(msg1.size, 8);
        assert_eq!(msg1.signals.len(), 2);

        // Check first signal
        let sig1 = &msg1.signals[0];
        assert_eq!(sig1.name, "EngineSpeed");
        assert_eq!(sig1.start_bit, 0);
        assert_eq!(sig1.length, 16);
        assert_eq!(sig1.factor, 1.0);
        assert_eq!(sig1.offset, 0.0);
        assert_eq!(sig1.unit, Some("rpm".to_string()));
        assert_eq!(sig1.decimal_places, None);

        let voltage = &messages[1].signals[0];
        assert_eq!(voltage.decimal_places, Some(2));
    }

    #[test]
    fn test_extended_id_and_value_descriptions() {
        let messages = parse_dbc_bytes(POWERTRAIN_DBC.as_bytes(), "powertrain.dbc").unwrap();

        let transmission = messages
            .iter()
            .find(|m| m.name == "TransmissionStatus")
            .unwrap();
        // 2566844672 = 0x80000000 | 0x18FEF100
        assert_eq!(transmission.id, CanId::extended(0x18FE_F100));

        let gear = &transmission.signals[0];
        let table = gear.value_table.as_ref().unwrap();
        assert_eq!(table.get(&1).map(String::as_str), Some("DRIVE"));
        assert_eq!(table.get(&0).map(String::as_str), Some("PARK"));
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let messages = parse_dbc_bytes(dbc_content.as_bytes(), "mux.dbc").unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert!(msg.is_multiplexed);
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));
        assert_eq!(msg.signals.len(), 3);

        // Check multiplexed signals
        let sig_a = msg.signals.iter().find(|s| s.name == "SignalA").unwrap();
        assert!(sig_a.multiplexer_info.is_some());
        assert_eq!(
            sig_a.multiplexer_info.as_ref().unwrap().multiplexer_signal,
            "Mode"
        );
    }

    #[test]
    fn test_nested_multiplexor_before_switch() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 513 NestedMux: 8 ECU1
 SG_ Sub m0M : 8|8@1+ (1,0) [0|255] "" ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ Value m1 : 16|8@1+ (1,0) [0|255] "" ECU1
"#;

        let messages = parse_dbc_bytes(dbc_content.as_bytes(), "nested.dbc").unwrap();
        let msg = &messages[0];
        assert_eq!(msg.multiplexer_signal.as_deref(), Some("Mode"));

        let sub = msg.signals.iter().find(|s| s.name == "Sub").unwrap();
        let info = sub.multiplexer_info.as_ref().unwrap();
        assert_eq!(info.multiplexer_signal, "Mode");
        assert_eq!(info.multiplexer_values, vec![0]);
        assert!(msg.signals.iter().find(|s| s.name == "Mode").unwrap().multiplexer_info.is_none());
    }

    #[test]
    fn test_malformed_dbc_is_an_error() {
        let result = parse_dbc_bytes(b"BO_ this is not a dbc", "broken.dbc");
        assert!(matches!(result, Err(DecoderError::DbcParseError(_))));
    }
}
