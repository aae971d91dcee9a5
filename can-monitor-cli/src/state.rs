//! Per-identifier message state
//!
//! [`MessageStore`] keeps the latest [`MessageRecord`] for every identifier seen on
//! the bus. The ingestion thread writes it, the render loop reads snapshots of
//! it; both go through the same lock, held only for one record update or one
//! copy of the map.

use can_monitor_decoder::{CanId, DecodedMessage, DecodedSignal};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Outcome of decoding one frame, ready to be stored.
///
/// A frame that could not be decoded has `name == None` and no signals; it
/// keeps its raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub id: CanId,
    pub name: Option<String>,
    pub dlc: u8,
    pub data: Vec<u8>,
    pub signals: Vec<DecodedSignal>,
}

impl FrameUpdate {
    /// Update for a decoded frame
    pub fn decoded(message: DecodedMessage, dlc: u8, data: Vec<u8>) -> Self {
        Self {
            id: message.can_id,
            name: Some(message.name),
            dlc,
            data,
            signals: message.signals,
        }
    }

    /// Update for a frame the database does not describe
    pub fn placeholder(id: CanId, dlc: u8, data: Vec<u8>) -> Self {
        Self {
            id,
            name: None,
            dlc,
            data,
            signals: Vec::new(),
        }
    }
}

/// Latest known state of one identifier
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: CanId,
    pub name: Option<String>,
    pub data: Vec<u8>,
    pub dlc: u8,
    pub signals: Vec<DecodedSignal>,
    pub count: u64,
    /// First arrival, relative to the store epoch
    pub first_seen: Duration,
    /// Latest arrival, relative to the store epoch
    pub last_seen: Duration,
    /// Time between the two latest arrivals, paused time excluded
    pub inter_arrival_ms: f64,
    /// Paused time since the latest arrival
    pub paused: Duration,
    pub show_signals: bool,
}

impl MessageRecord {
    /// True if the identifier is in the extended range
    pub fn extended(&self) -> bool {
        self.id.extended
    }

    fn new(update: FrameUpdate, at: Duration) -> Self {
        Self {
            id: update.id,
            name: update.name,
            data: update.data,
            dlc: update.dlc,
            signals: update.signals,
            count: 1,
            first_seen: at,
            last_seen: at,
            inter_arrival_ms: 0.0,
            paused: Duration::ZERO,
            show_signals: true,
        }
    }

    fn apply(&mut self, update: FrameUpdate, at: Duration) {
        self.name = update.name;
        self.data = update.data;
        self.dlc = update.dlc;
        self.signals = update.signals;
        let gap = at.saturating_sub(self.last_seen).saturating_sub(self.paused);
        self.inter_arrival_ms = gap.as_secs_f64() * 1000.0;
        self.paused = Duration::ZERO;
        self.last_seen = at;
        self.count += 1;
    }
}

struct StoreInner {
    records: BTreeMap<CanId, MessageRecord>,
    epoch: Instant,
    total_frames: u64,
}

/// Point-in-time copy of the store
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Records in ascending identifier order
    pub records: Vec<MessageRecord>,
    /// Frames stored since the last clear
    pub total_frames: u64,
}

/// Shared identifier -> record map
pub struct MessageStore {
    inner: Mutex<StoreInner>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                records: BTreeMap::new(),
                epoch,
                total_frames: 0,
            }),
        }
    }

    /// Insert or update the record for `update.id`, stamped now
    pub fn upsert(&self, update: FrameUpdate) {
        self.upsert_at(update, Instant::now());
    }

    /// Insert or update the record for `update.id`, stamped at `now`
    pub fn upsert_at(&self, update: FrameUpdate, now: Instant) {
        let mut inner = self.inner.lock();
        let at = now.saturating_duration_since(inner.epoch);
        inner.total_frames += 1;

        match inner.records.get_mut(&update.id) {
            Some(record) => record.apply(update, at),
            None => {
                inner
                    .records
                    .insert(update.id, MessageRecord::new(update, at));
            }
        }
    }

    /// Leave `span` out of the next inter-arrival time of every record
    pub fn exclude_pause(&self, span: Duration) {
        let mut inner = self.inner.lock();
        for record in inner.records.values_mut() {
            record.paused += span;
        }
    }

    /// Copy of all records, ascending by identifier
    pub fn snapshot_ordered(&self) -> Vec<MessageRecord> {
        self.inner.lock().records.values().cloned().collect()
    }

    /// Copy of all records plus counters, taken under one lock
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            records: inner.records.values().cloned().collect(),
            total_frames: inner.total_frames,
        }
    }

    /// Drop every record and restart the time base now
    pub fn clear(&self) {
        self.clear_at(Instant::now());
    }

    /// Drop every record and restart the time base at `now`
    pub fn clear_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.records.clear();
        inner.total_frames = 0;
        inner.epoch = now;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames stored since the last clear
    pub fn total_frames(&self) -> u64 {
        self.inner.lock().total_frames
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_monitor_decoder::SignalValue;
    use std::sync::Arc;

    fn temp_signal(value: f64) -> DecodedSignal {
        DecodedSignal {
            name: "Temp".to_string(),
            value: SignalValue::Float(value),
            raw_value: (value * 10.0) as i64,
            unit: Some("C".to_string()),
            value_description: None,
            decimal_places: Some(1),
        }
    }

    fn update(id: CanId, data: &[u8], signals: Vec<DecodedSignal>) -> FrameUpdate {
        FrameUpdate {
            id,
            name: Some("Engine".to_string()),
            dlc: data.len() as u8,
            data: data.to_vec(),
            signals,
        }
    }

    #[test]
    fn test_count_tracks_upserts_and_latest_wins() {
        let store = MessageStore::new();
        let id = CanId::standard(0x123);

        for i in 0..5u8 {
            let signals = (0..=i).map(|n| temp_signal(n as f64)).collect();
            store.upsert(update(id, &[i; 4], signals));
        }
        store.upsert(update(id, &[9, 9], vec![temp_signal(42.0)]));

        let snapshot = store.snapshot_ordered();
        assert_eq!(snapshot.len(), 1);
        let record = &snapshot[0];
        assert_eq!(record.count, 6);
        assert_eq!(record.data, vec![9, 9]);
        assert_eq!(record.dlc, 2);
        assert_eq!(record.signals, vec![temp_signal(42.0)]);
    }

    #[test]
    fn test_standard_and_extended_are_distinct() {
        let store = MessageStore::new();
        store.upsert(FrameUpdate::placeholder(CanId::standard(0x100), 1, vec![1]));
        store.upsert(FrameUpdate::placeholder(CanId::extended(0x100), 1, vec![2]));

        let snapshot = store.snapshot_ordered();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot[0].extended());
        assert!(snapshot[1].extended());
        assert_eq!(snapshot[0].count, 1);
        assert_eq!(snapshot[1].count, 1);
    }

    #[test]
    fn test_snapshot_is_ascending_for_any_insertion_order() {
        let store = MessageStore::new();
        for id in [0x7FF, 0x001, 0x400, 0x0FF, 0x123, 0x002] {
            store.upsert(FrameUpdate::placeholder(CanId::standard(id), 0, vec![]));
        }
        store.upsert(FrameUpdate::placeholder(CanId::extended(0x1000), 0, vec![]));

        let ids: Vec<u32> = store.snapshot_ordered().iter().map(|r| r.id.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "not ascending: {:?}", ids);
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_inter_arrival_and_timestamps() {
        let t0 = Instant::now();
        let store = MessageStore::with_epoch(t0);
        let id = CanId::standard(0x7E0);

        let first = update(id, &[0x64, 0, 0, 0, 0, 0, 0, 0], vec![temp_signal(10.0)]);
        let second = update(id, &[0xC8, 0, 0, 0, 0, 0, 0, 0], vec![temp_signal(20.0)]);
        store.upsert_at(first, t0 + Duration::from_millis(200));
        store.upsert_at(second, t0 + Duration::from_millis(250));

        let record = &store.snapshot_ordered()[0];
        assert_eq!(record.count, 2);
        assert!((record.inter_arrival_ms - 50.0).abs() < 1e-6);
        assert_eq!(record.first_seen, Duration::from_millis(200));
        assert_eq!(record.last_seen, Duration::from_millis(250));
        assert_eq!(record.signals[0].display_value(), "20.0");
    }

    #[test]
    fn test_paused_span_is_left_out_of_inter_arrival() {
        let t0 = Instant::now();
        let store = MessageStore::with_epoch(t0);
        let id = CanId::standard(0x7E0);

        store.upsert_at(FrameUpdate::placeholder(id, 0, vec![]), t0 + Duration::from_millis(100));
        store.exclude_pause(Duration::from_millis(700));
        store.upsert_at(FrameUpdate::placeholder(id, 0, vec![]), t0 + Duration::from_millis(850));

        let record = &store.snapshot_ordered()[0];
        assert!((record.inter_arrival_ms - 50.0).abs() < 1e-6);
        // Wall-clock arrival time is untouched
        assert_eq!(record.last_seen, Duration::from_millis(850));
        assert_eq!(record.paused, Duration::ZERO);

        // Only the first interval after a pause is shortened
        store.upsert_at(FrameUpdate::placeholder(id, 0, vec![]), t0 + Duration::from_millis(900));
        assert!((store.snapshot_ordered()[0].inter_arrival_ms - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear_empties_and_resets_time_base() {
        let t0 = Instant::now();
        let store = MessageStore::with_epoch(t0);
        let id = CanId::standard(0x10);

        store.upsert_at(FrameUpdate::placeholder(id, 0, vec![]), t0 + Duration::from_secs(30));
        assert_eq!(store.total_frames(), 1);

        let t1 = t0 + Duration::from_secs(31);
        store.clear_at(t1);
        assert!(store.snapshot_ordered().is_empty());
        assert!(store.is_empty());
        assert_eq!(store.total_frames(), 0);

        store.upsert_at(FrameUpdate::placeholder(id, 0, vec![]), t1);
        let record = &store.snapshot_ordered()[0];
        assert_eq!(record.count, 1);
        assert_eq!(record.last_seen, Duration::ZERO);
        assert_eq!(record.inter_arrival_ms, 0.0);
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let store = Arc::new(MessageStore::new());
        let writer_store = Arc::clone(&store);

        let writer = std::thread::spawn(move || {
            for i in 0..1000u32 {
                let id = CanId::standard(i % 16);
                writer_store.upsert(update(id, &[i as u8; 8], vec![temp_signal(i as f64)]));
            }
        });

        for _ in 0..100 {
            for record in store.snapshot_ordered() {
                // A record is never observed half-written
                assert_eq!(record.data.len(), record.dlc as usize);
                assert_eq!(record.signals.len(), 1);
                assert_eq!(record.data[0], record.signals[0].value.as_f64() as u32 as u8);
            }
        }
        writer.join().unwrap();

        let total: u64 = store.snapshot_ordered().iter().map(|r| r.count).sum();
        assert_eq!(total, 1000);
        assert_eq!(store.total_frames(), 1000);
    }
}
