// In-flight measurement table
// Started durations waiting for a stop or cancel, keyed by a unique id
//
// Numan Thabit 2025 Nov

use crate::params::Params;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Source of measurement ids. Ids must be unique among open measurements.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InFlightMeasurement {
    pub tag: String,
    pub params: Params,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InFlightTable {
    entries: HashMap<String, InFlightMeasurement>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, id: String, tag: &str, params: Params, now: DateTime<Utc>) {
        self.entries.insert(
            id,
            InFlightMeasurement {
                tag: tag.to_string(),
                params,
                started_at: now,
            },
        );
    }

    /// Consume a measurement and return it with its elapsed milliseconds.
    /// Unknown or already consumed ids yield `None`.
    pub fn end(&mut self, id: &str, now: DateTime<Utc>) -> Option<(InFlightMeasurement, f64)> {
        let measurement = self.entries.remove(id)?;
        let elapsed_us = (now - measurement.started_at)
            .num_microseconds()
            .unwrap_or(i64::MAX);
        Some((measurement, elapsed_us as f64 / 1000.0))
    }

    /// Drop a measurement without recording it. Returns whether it existed.
    pub fn cancel(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn end_reports_elapsed_millis_once() {
        let mut table = InFlightTable::new();
        table.begin("m1".into(), "spit", Params::new().with("a", 21), t0());

        let (measurement, elapsed) = table
            .end("m1", t0() + TimeDelta::milliseconds(50))
            .unwrap();
        assert_eq!(measurement.tag, "spit");
        assert_eq!(measurement.params, Params::new().with("a", 21));
        assert_eq!(elapsed, 50.0);

        assert!(table.end("m1", t0()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn sub_millisecond_precision_is_kept() {
        let mut table = InFlightTable::new();
        table.begin("m1".into(), "spit", Params::new(), t0());
        let (_, elapsed) = table
            .end("m1", t0() + TimeDelta::microseconds(1500))
            .unwrap();
        assert_eq!(elapsed, 1.5);
    }

    #[test]
    fn cancel_removes_without_result() {
        let mut table = InFlightTable::new();
        table.begin("m1".into(), "spit", Params::new(), t0());
        assert!(table.cancel("m1"));
        assert!(!table.cancel("m1"));
        assert!(table.end("m1", t0()).is_none());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut table = InFlightTable::new();
        assert!(table.end("missing", t0()).is_none());
        assert!(!table.cancel("missing"));
    }

    #[test]
    fn uuid_ids_are_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.new_id(), ids.new_id());
    }
}
