//! Bounded history of saved predictions
//!
//! The whole history lives in one slot as a JSON array, newest first, capped
//! at [`HISTORY_CAPACITY`] entries. Every mutation is a read-modify-write of
//! that slot through [`HistoryStore`]; nothing else writes it.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::client::PredictionOutcome;
use crate::error::DiabRiskError;
use crate::model::{Gender, Prediction, PredictionInput, Smoking};
use crate::storage::KeyValueStore;

/// Slot name, shared with the browser front end's local storage key
pub const HISTORY_KEY: &str = "diabetesPredictionHistory";
pub const HISTORY_CAPACITY: usize = 10;

/// A saved prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::whole_number")]
    pub age: u32,
    #[serde(deserialize_with = "lenient::number")]
    pub bmi: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub hba1c: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub blood_glucose: f64,
    pub gender: Gender,
    pub smoking: Smoking,
    pub result: Prediction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

impl HistoryRecord {
    pub fn new(
        id: String,
        timestamp: DateTime<Utc>,
        input: &PredictionInput,
        outcome: &PredictionOutcome,
    ) -> Self {
        Self {
            id,
            timestamp: truncate_to_millis(timestamp),
            age: input.age,
            bmi: input.bmi,
            hba1c: input.hba1c,
            blood_glucose: input.blood_glucose,
            gender: input.gender,
            smoking: input.smoking,
            result: outcome.prediction,
            confidence: outcome.confidence.clone(),
        }
    }

    /// The inputs this prediction was made from
    pub fn input(&self) -> PredictionInput {
        PredictionInput {
            age: self.age,
            bmi: self.bmi,
            hba1c: self.hba1c,
            blood_glucose: self.blood_glucose,
            gender: self.gender,
            smoking: self.smoking,
        }
    }

    /// Local date and time for list display
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

/// Ordered, size-bounded history over a single key-value slot
pub struct HistoryStore<S: KeyValueStore> {
    slot: S,
    capacity: usize,
    /// Millisecond stamp of the last id handed out, so ids never repeat
    last_issued: Option<i64>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(slot: S) -> Self {
        Self::with_capacity(slot, HISTORY_CAPACITY)
    }

    pub fn with_capacity(slot: S, capacity: usize) -> Self {
        Self { slot, capacity, last_issued: None }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All records, most recent first. Missing or unreadable data is an empty history.
    pub fn list(&self) -> Vec<HistoryRecord> {
        match self.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring stored history: {}", e);
                Vec::new()
            }
        }
    }

    fn load(&self) -> Result<Vec<HistoryRecord>, DiabRiskError> {
        let Some(raw) = self.slot.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| DiabRiskError::StorageCorrupt(e.to_string()))
    }

    /// Current records for a read-modify-write. A corrupt slot starts over
    /// empty; a failed read aborts so nothing is overwritten.
    fn load_for_update(&self) -> Result<Vec<HistoryRecord>, DiabRiskError> {
        match self.load() {
            Err(DiabRiskError::StorageCorrupt(e)) => {
                warn!("Replacing corrupt history: {}", e);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<(), DiabRiskError> {
        let json = serde_json::to_string(records)?;
        self.slot.set(HISTORY_KEY, &json)
    }

    /// Prepend a record, evicting the oldest entries beyond capacity.
    ///
    /// A stored record with the same id is replaced.
    pub fn insert(&self, mut record: HistoryRecord) -> Result<(), DiabRiskError> {
        record.timestamp = truncate_to_millis(record.timestamp);
        let mut records = self.load_for_update()?;
        records.retain(|r| r.id != record.id);
        records.insert(0, record);
        if records.len() > self.capacity {
            let evicted = records.len() - self.capacity;
            records.truncate(self.capacity);
            debug!("Evicted {} oldest history record(s)", evicted);
        }
        self.persist(&records)
    }

    pub fn find_by_id(&self, id: &str) -> Option<HistoryRecord> {
        self.list().into_iter().find(|r| r.id == id)
    }

    /// Remove a record. Returns `false` (and writes nothing) if it was not there.
    /// Deleting the last record clears the slot.
    pub fn delete_by_id(&self, id: &str) -> Result<bool, DiabRiskError> {
        let mut records = self.load_for_update()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        if records.is_empty() {
            self.slot.remove(HISTORY_KEY)?;
        } else {
            self.persist(&records)?;
        }
        Ok(true)
    }

    /// Create a record for a finished prediction and insert it
    pub fn record(
        &mut self,
        input: &PredictionInput,
        outcome: &PredictionOutcome,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, DiabRiskError> {
        let (id, timestamp) = self.issue_id(now)?;
        let record = HistoryRecord::new(id, timestamp, input, outcome);
        self.insert(record.clone())?;
        info!("Saved prediction {} ({})", record.id, record.result);
        Ok(record)
    }

    /// `pred_<unix millis>`, bumped past every stored id and every id issued before
    fn issue_id(&mut self, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), DiabRiskError> {
        let existing = self.load_for_update()?;
        let mut millis = now.timestamp_millis();
        if let Some(last) = self.last_issued {
            millis = millis.max(last + 1);
        }
        while existing.iter().any(|r| r.id == format_id(millis)) {
            millis += 1;
        }
        self.last_issued = Some(millis);
        let timestamp = now + Duration::milliseconds(millis - now.timestamp_millis());
        Ok((format_id(millis), truncate_to_millis(timestamp)))
    }
}

fn format_id(millis: i64) -> String {
    format!("pred_{}", millis)
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// ISO-8601 with millisecond precision and a `Z` suffix
mod iso_millis {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Numbers stored either as JSON numbers or as the raw form strings
mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match NumOrText::deserialize(d)? {
            NumOrText::Num(v) => Ok(v),
            NumOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }

    pub fn whole_number<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let v = number(d)?;
        if v.fract() != 0.0 || v < 0.0 || v > u32::MAX as f64 {
            return Err(serde::de::Error::custom(format!("invalid age {}", v)));
        }
        Ok(v as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SqliteStore};
    use chrono::TimeZone;
    use std::cell::Cell;

    /// Memory slot whose next `get` fails once when armed
    struct FailingReadStore {
        inner: MemoryStore,
        fail_next_get: Cell<bool>,
    }

    impl FailingReadStore {
        fn new() -> Self {
            Self { inner: MemoryStore::new(), fail_next_get: Cell::new(false) }
        }
    }

    impl KeyValueStore for FailingReadStore {
        fn get(&self, key: &str) -> Result<Option<String>, DiabRiskError> {
            if self.fail_next_get.replace(false) {
                return Err(DiabRiskError::Storage(rusqlite::Error::InvalidQuery));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), DiabRiskError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), DiabRiskError> {
            self.inner.remove(key)
        }
    }

    fn input() -> PredictionInput {
        PredictionInput {
            age: 55,
            bmi: 27.0,
            hba1c: 5.8,
            blood_glucose: 130.0,
            gender: Gender::Male,
            smoking: Smoking::Yes,
        }
    }

    fn outcome(prediction: Prediction) -> PredictionOutcome {
        PredictionOutcome { prediction, confidence: Some("82%".to_string()) }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn record(n: i64) -> HistoryRecord {
        HistoryRecord::new(format!("pred_{}", n), at(n), &input(), &outcome(Prediction::NonDiabetic))
    }

    #[test]
    fn test_empty_when_missing() {
        let store = HistoryStore::new(MemoryStore::new());
        assert!(store.list().is_empty());
        assert!(store.find_by_id("pred_1").is_none());
    }

    #[test]
    fn test_capacity_keeps_ten_most_recent() {
        let store = HistoryStore::new(MemoryStore::new());
        for n in 0..11 {
            store.insert(record(n)).unwrap();
        }
        let ids: Vec<String> = store.list().into_iter().map(|r| r.id).collect();
        let expected: Vec<String> = (1..11).rev().map(|n| format!("pred_{}", n)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_find_after_insert() {
        let store = HistoryStore::new(MemoryStore::new());
        let rec = record(7);
        store.insert(rec.clone()).unwrap();
        assert_eq!(store.find_by_id("pred_7"), Some(rec));
    }

    #[test]
    fn test_delete() {
        let store = HistoryStore::new(MemoryStore::new());
        store.insert(record(1)).unwrap();
        store.insert(record(2)).unwrap();

        assert!(!store.delete_by_id("pred_99").unwrap());
        assert_eq!(store.list().len(), 2);

        assert!(store.delete_by_id("pred_1").unwrap());
        let ids: Vec<String> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["pred_2".to_string()]);

        assert!(store.delete_by_id("pred_2").unwrap());
        assert_eq!(store.slot.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let store = HistoryStore::new(MemoryStore::new());
        store.insert(record(1)).unwrap();
        store.insert(record(2)).unwrap();
        store.insert(record(1)).unwrap();
        let ids: Vec<String> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["pred_1".to_string(), "pred_2".to_string()]);
    }

    #[test]
    fn test_corrupt_slot_is_empty_and_heals() {
        let slot = MemoryStore::new();
        slot.set(HISTORY_KEY, "{not json").unwrap();
        let store = HistoryStore::new(slot);
        assert!(store.list().is_empty());
        assert!(!store.delete_by_id("pred_1").unwrap());

        store.insert(record(3)).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let written = {
            let store = HistoryStore::new(SqliteStore::new(&path).unwrap());
            for n in 0..4 {
                store.insert(record(n)).unwrap();
            }
            store.list()
        };
        let reopened = HistoryStore::new(SqliteStore::new(&path).unwrap());
        assert_eq!(reopened.list(), written);
    }

    #[test]
    fn test_reads_legacy_string_fields() {
        let legacy = r#"[{
            "id": "pred_1700000000000",
            "timestamp": "2023-11-14T22:13:20.000Z",
            "age": "55",
            "bmi": "27",
            "hba1c": "5.8",
            "blood_glucose": "130",
            "gender": "Male",
            "smoking": "Yes",
            "result": "Diabetic"
        }]"#;
        let slot = MemoryStore::new();
        slot.set(HISTORY_KEY, legacy).unwrap();
        let store = HistoryStore::new(slot);
        let records = store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input(), input());
        assert_eq!(records[0].result, Prediction::Diabetic);
        assert_eq!(records[0].confidence, None);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(record(5)).unwrap();
        assert_eq!(json["id"], "pred_5");
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20.005Z");
        assert_eq!(json["result"], "Non-Diabetic");
        assert_eq!(json["smoking"], "Yes");
        assert_eq!(json["blood_glucose"], 130.0);
    }

    #[test]
    fn test_record_issues_unique_ids() {
        let mut store = HistoryStore::new(MemoryStore::new());
        let now = at(0);
        let a = store.record(&input(), &outcome(Prediction::Diabetic), now).unwrap();
        let b = store.record(&input(), &outcome(Prediction::Diabetic), now).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.timestamp > a.timestamp);

        // Deleting the newest must not let its id be handed out again
        store.delete_by_id(&b.id).unwrap();
        let c = store.record(&input(), &outcome(Prediction::Diabetic), now).unwrap();
        assert_ne!(c.id, b.id);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_failed_read_does_not_overwrite_history() {
        let store = HistoryStore::new(FailingReadStore::new());
        for n in 0..5 {
            store.insert(record(n)).unwrap();
        }

        store.slot.fail_next_get.set(true);
        assert!(matches!(store.insert(record(9)), Err(DiabRiskError::Storage(_))));
        assert_eq!(store.list().len(), 5);

        store.slot.fail_next_get.set(true);
        assert!(store.delete_by_id("pred_1").is_err());
        assert!(store.find_by_id("pred_1").is_some());

        store.insert(record(9)).unwrap();
        assert_eq!(store.list().len(), 6);
    }

    #[test]
    fn test_sub_millisecond_timestamp_survives_round_trip() {
        let store = HistoryStore::new(MemoryStore::new());
        let ts = at(123) + Duration::nanoseconds(456_789);
        let rec = HistoryRecord::new("pred_x".to_string(), ts, &input(), &outcome(Prediction::Diabetic));
        assert_eq!(rec.timestamp, at(123));
        store.insert(rec.clone()).unwrap();
        assert_eq!(store.find_by_id("pred_x"), Some(rec));

        let mut raw = record(4);
        raw.timestamp = ts;
        store.insert(raw).unwrap();
        assert_eq!(store.find_by_id("pred_4").map(|r| r.timestamp), Some(at(123)));
    }
}
