//! End-to-end decoding through the public API with on-disk databases

use can_monitor_decoder::{CanId, DecodeFailure, Decoder, SignalValue};
use std::io::Write;
use tempfile::Builder;

const VEHICLE_DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU TCU

BO_ 2016 EngineTemps: 8 ECU
 SG_ Temp : 0|8@1+ (0.1,0) [0|25.5] "C" TCU

BO_ 256 GearStd: 1 TCU
 SG_ Gear : 0|4@1+ (1,0) [0|15] "" ECU

BO_ 2147483904 GearExt: 2 TCU
 SG_ Torque : 7|16@0- (1,0) [-32768|32767] "Nm" ECU

VAL_ 256 Gear 1 "DRIVE" 0 "PARK" ;
"#;

fn dbc_decoder() -> Decoder {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut file = Builder::new().suffix(".dbc").tempfile().unwrap();
    file.write_all(VEHICLE_DBC.as_bytes()).unwrap();
    file.flush().unwrap();
    Decoder::from_path(file.path()).unwrap()
}

#[test]
fn scaled_temperature_from_dbc() {
    let decoder = dbc_decoder();
    let id = CanId::standard(0x7E0);

    let first = decoder.decode(id, 8, &[0x64, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    assert_eq!(first.name, "EngineTemps");
    assert_eq!(first.signals[0].name, "Temp");
    assert_eq!(first.signals[0].display_value(), "10.0");
    assert_eq!(first.signals[0].unit.as_deref(), Some("C"));

    let second = decoder.decode(id, 8, &[0xC8, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    match second.signals[0].value {
        SignalValue::Float(v) => assert!((v - 20.0).abs() < 1e-9),
        other => panic!("expected a scaled value, got {:?}", other),
    }
}

#[test]
fn enumerated_gear() {
    let decoder = dbc_decoder();
    let id = CanId::standard(0x100);

    let drive = decoder.decode(id, 1, &[0x01]).unwrap();
    assert_eq!(drive.signals[0].display_value(), "DRIVE");

    let unmapped = decoder.decode(id, 1, &[0x05]).unwrap();
    assert_eq!(unmapped.signals[0].display_value(), "5");
}

#[test]
fn standard_and_extended_ids_do_not_collide() {
    let decoder = dbc_decoder();

    let std_msg = decoder.decode(CanId::standard(0x100), 1, &[0x00]).unwrap();
    assert_eq!(std_msg.name, "GearStd");

    let ext_msg = decoder.decode(CanId::extended(0x100), 2, &[0xFF, 0xFE]).unwrap();
    assert_eq!(ext_msg.name, "GearExt");
    // Signed Motorola 16-bit: 0xFFFE = -2
    assert_eq!(ext_msg.signals[0].value, SignalValue::Integer(-2));
}

#[test]
fn length_mismatch_is_a_decode_failure() {
    let decoder = dbc_decoder();
    let id = CanId::standard(0x7E0);

    assert_eq!(
        decoder.decode(id, 4, &[0x64, 0, 0, 0]),
        Err(DecodeFailure::LengthMismatch {
            id,
            expected: 8,
            actual: 4,
        })
    );
    assert_eq!(
        decoder.decode(CanId::standard(0x555), 8, &[0; 8]),
        Err(DecodeFailure::NotFound(CanId::standard(0x555)))
    );
}
