//! Text formatting for the dashboard
//!
//! Everything here is pure: records and view flags in, lines of text out. The
//! terminal painter decides where the lines go and how they are styled.

use crate::state::MessageRecord;
use crate::view::{Mode, ViewState};
use chrono::{DateTime, Local};
use std::time::Duration;

/// Bytes shown per data row; longer payloads continue on extra rows
pub const BYTES_PER_ROW: usize = 8;

const ID_WIDTH: usize = 10;
const LEN_WIDTH: usize = 6;
const NAME_WIDTH: usize = 32;
const DATA_WIDTH: usize = BYTES_PER_ROW * 3 - 1;
const ASCII_WIDTH: usize = BYTES_PER_ROW;
const COUNT_WIDTH: usize = 7;
const TIME_WIDTH: usize = 10;

const KEY_HELP: &str = "q:quit p:pause s:signals b:bold c:clear";

/// What a body line shows, so the painter can style it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Message,
    Continuation,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
}

impl Line {
    fn new(kind: LineKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// The two fixed header lines
pub fn header_lines() -> [String; 2] {
    let titles = format!(
        "{:^id$} | {:^len$} | {:^name$} | {:^data$} | {:^ascii$} | {:^count$} | {:^time$} | {}",
        "ID",
        "Length",
        "Name",
        "Data/Value",
        "Ascii",
        "Count",
        "Time",
        "Delta(ms)",
        id = ID_WIDTH,
        len = LEN_WIDTH,
        name = NAME_WIDTH,
        data = DATA_WIDTH,
        ascii = ASCII_WIDTH,
        count = COUNT_WIDTH,
        time = TIME_WIDTH,
    );

    let rule = titles
        .chars()
        .map(|c| if c == '|' { '|' } else { '-' })
        .collect();

    [titles, rule]
}

/// Space separated upper-case hex, e.g. `DE AD BE EF`
pub fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Printable ASCII as-is, everything else as `.`
pub fn ascii_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Lines for one record: the message row, data continuation rows and, when the
/// record shows signals, one row per signal
pub fn format_record(record: &MessageRecord) -> Vec<Line> {
    let mut chunks = record.data.chunks(BYTES_PER_ROW);
    let first = chunks.next().unwrap_or(&[]);

    let mut lines = vec![Line::new(
        LineKind::Message,
        format!(
            "{:<id$} | {:>len$} | {:<name$} | {:<data$} | {:<ascii$} | {:>count$} | {:>time$.2} | {:>9.2}",
            record.id.to_string(),
            record.dlc,
            record.name.as_deref().unwrap_or(""),
            hex_bytes(first),
            ascii_bytes(first),
            record.count,
            record.last_seen.as_secs_f64(),
            record.inter_arrival_ms,
            id = ID_WIDTH,
            len = LEN_WIDTH,
            name = NAME_WIDTH,
            data = DATA_WIDTH,
            ascii = ASCII_WIDTH,
            count = COUNT_WIDTH,
            time = TIME_WIDTH,
        ),
    )];

    for chunk in chunks {
        lines.push(Line::new(
            LineKind::Continuation,
            format!(
                "{:id$} | {:len$} | {:name$} | {:<data$} | {:<ascii$} |",
                "",
                "",
                "",
                hex_bytes(chunk),
                ascii_bytes(chunk),
                id = ID_WIDTH,
                len = LEN_WIDTH,
                name = NAME_WIDTH,
                data = DATA_WIDTH,
                ascii = ASCII_WIDTH,
            ),
        ));
    }

    if record.show_signals {
        for signal in &record.signals {
            lines.push(Line::new(
                LineKind::Signal,
                format!(
                    "{:>id$} | {:len$} | {:<name$} | {:<data$} {}",
                    "[sig]",
                    "",
                    signal.name,
                    signal.display_value(),
                    signal.unit.as_deref().unwrap_or(""),
                    id = ID_WIDTH,
                    len = LEN_WIDTH,
                    name = NAME_WIDTH,
                    data = DATA_WIDTH,
                ),
            ));
        }
    }

    lines
}

/// Body lines for every record, in the order given
pub fn format_body(records: &[MessageRecord]) -> Vec<Line> {
    records.iter().flat_map(format_record).collect()
}

/// Title bar text
pub fn title_line(
    channel: &str,
    db_messages: usize,
    started: DateTime<Local>,
    elapsed: Duration,
    total_frames: u64,
) -> String {
    let secs = elapsed.as_secs();
    format!(
        " can-monitor | {} | {} msgs in db | since {} (+{:02}:{:02}:{:02}) | {} frames | {}",
        channel,
        db_messages,
        started.format("%H:%M:%S"),
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        total_frames,
        KEY_HELP,
    )
}

/// Status bar text
pub fn status_line(glyph: &str, view: &ViewState, content_height: usize) -> String {
    let mode = match view.mode() {
        Mode::Running => "RUNNING",
        Mode::Paused => "PAUSED",
    };
    format!(
        " {} {} | signals {} | line {}/{} | key {}",
        // Blank while paused: nothing is being received
        if view.is_paused() { " " } else { glyph },
        mode,
        if view.show_signals { "shown" } else { "hidden" },
        view.scroll_offset,
        content_height,
        view.last_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::PauseGate;
    use crate::view::Key;
    use can_monitor_decoder::{CanId, DecodedSignal, SignalValue};
    use std::sync::Arc;

    fn record(id: CanId, data: &[u8]) -> MessageRecord {
        MessageRecord {
            id,
            name: Some("EngineTemps".to_string()),
            data: data.to_vec(),
            dlc: data.len() as u8,
            signals: vec![DecodedSignal {
                name: "Temp".to_string(),
                value: SignalValue::Float(20.0),
                raw_value: 200,
                unit: Some("C".to_string()),
                value_description: None,
                decimal_places: Some(1),
            }],
            count: 2,
            first_seen: Duration::from_millis(200),
            last_seen: Duration::from_millis(1250),
            paused: Duration::ZERO,
            inter_arrival_ms: 50.0,
            show_signals: true,
        }
    }

    #[test]
    fn test_header_names_every_column() {
        let [titles, rule] = header_lines();
        for column in [
            "ID",
            "Length",
            "Name",
            "Data/Value",
            "Ascii",
            "Count",
            "Time",
            "Delta(ms)",
        ] {
            assert!(titles.contains(column), "missing {}", column);
        }
        assert_eq!(titles.matches('|').count(), rule.matches('|').count());
    }

    #[test]
    fn test_hex_and_ascii() {
        assert_eq!(hex_bytes(&[0xDE, 0xAD, 0x01]), "DE AD 01");
        assert_eq!(hex_bytes(&[]), "");
        assert_eq!(ascii_bytes(b"Hi\x00\x7F~"), "Hi..~");
    }

    #[test]
    fn test_message_row_and_signal_row() {
        let lines = format_record(&record(CanId::standard(0x7E0), &[0xC8, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(lines.len(), 2);

        let row = &lines[0];
        assert_eq!(row.kind, LineKind::Message);
        assert!(row.text.starts_with("0x7E0"));
        assert!(row.text.contains("EngineTemps"));
        assert!(row.text.contains("C8 00 00 00 00 00 00 00"));
        assert!(row.text.contains("1.25"));
        assert!(row.text.ends_with("50.00"));

        let sig = &lines[1];
        assert_eq!(sig.kind, LineKind::Signal);
        assert!(sig.text.contains("[sig]"));
        assert!(sig.text.contains("Temp"));
        assert!(sig.text.contains("20.0"));
        assert!(sig.text.trim_end().ends_with('C'));
    }

    #[test]
    fn test_undecoded_record_has_blank_name() {
        let mut rec = record(CanId::extended(0x18FF50E5), &[0x41]);
        rec.name = None;
        rec.signals.clear();

        let lines = format_record(&rec);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.starts_with("0x18FF50E5"));
        assert!(!lines[0].text.contains("None"));
    }

    #[test]
    fn test_long_payload_continues_on_extra_rows() {
        let data: Vec<u8> = (0..20).collect();
        let mut rec = record(CanId::standard(0x100), &data);
        rec.show_signals = false;

        let lines = format_record(&rec);
        let kinds: Vec<LineKind> = lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Message,
                LineKind::Continuation,
                LineKind::Continuation
            ]
        );
        assert!(lines[1].text.contains("08 09 0A 0B 0C 0D 0E 0F"));
        assert!(lines[2].text.contains("10 11 12 13"));
    }

    #[test]
    fn test_hidden_signals_change_only_line_count() {
        let mut rec = record(CanId::standard(0x7E0), &[0; 8]);
        let shown = format_body(std::slice::from_ref(&rec));
        rec.show_signals = false;
        let hidden = format_body(std::slice::from_ref(&rec));

        assert_eq!(shown.len(), 2);
        assert_eq!(hidden.len(), 1);
        assert_eq!(shown[0], hidden[0]);
    }

    #[test]
    fn test_title_line() {
        let title = title_line(
            "vcan0",
            12,
            Local::now(),
            Duration::from_secs(3 * 3600 + 25 * 60 + 7),
            999,
        );
        assert!(title.contains("vcan0"));
        assert!(title.contains("12 msgs in db"));
        assert!(title.contains("+03:25:07"));
        assert!(title.contains("999 frames"));
        assert!(title.contains("q:quit"));
    }

    #[test]
    fn test_status_line() {
        let pause = Arc::new(PauseGate::default());
        let mut view = ViewState::new(pause, 120, 30);
        view.apply(Some(Key::ScrollDown), 100);

        let status = status_line("/", &view, 100);
        assert!(status.contains("/ RUNNING"));
        assert!(status.contains("signals shown"));
        assert!(status.contains("line 1/100"));
        assert!(status.contains("key down"));

        view.apply(Some(Key::PauseToggle), 100);
        view.apply(Some(Key::SignalsToggle), 100);
        let status = status_line("/", &view, 100);
        assert!(status.starts_with("   PAUSED"));
        assert!(status.contains("signals hidden"));
    }
}
