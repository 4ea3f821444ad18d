// Accumulator store
// Folds observations into one running aggregate per grouping key for the
// current window, and hands the whole window over at flush time
//
// Numan Thabit 2025 Nov

use crate::aggregate::key::GroupingKey;
use crate::params::{Params, Severity};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Whether an observation carries a numeric value or only marks an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    /// measure/count/stop: min, max, sum and average are tracked.
    Value,
    /// trace..fatal counters: only the occurrence count is tracked.
    Event,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Value => "value",
            ObservationKind::Event => "event",
        }
    }
}

/// Running statistics of a value-bearing record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub average: f64,
}

/// Number of observations strictly above `threshold` in this window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCount {
    pub threshold: f64,
    pub count: u64,
}

impl ThresholdCount {
    pub fn field_name(&self) -> String {
        format!("above_{}", self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub tag: String,
    pub params: Params,
    pub severity: Severity,
    pub count: u64,
    /// `None` for event counters.
    pub stats: Option<ValueStats>,
    /// Counters for every threshold seen while this record was open, in
    /// registration order.
    pub thresholds: Vec<ThresholdCount>,
}

impl AggregateRecord {
    fn new(
        tag: &str,
        params: &Params,
        severity: Severity,
        kind: ObservationKind,
        value: f64,
        thresholds: &[f64],
    ) -> Self {
        let mut record = Self {
            tag: tag.to_string(),
            params: params.clone(),
            severity,
            count: 1,
            stats: None,
            thresholds: Vec::new(),
        };
        if kind == ObservationKind::Value {
            record.stats = Some(ValueStats {
                min: value,
                max: value,
                sum: value,
                average: value,
            });
            record.bump_thresholds(value, thresholds);
        }
        record
    }

    fn observe(&mut self, value: f64, thresholds: &[f64]) {
        self.count += 1;
        if let Some(stats) = self.stats.as_mut() {
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
            stats.sum += value;
            stats.average = stats.sum / self.count as f64;
            self.bump_thresholds(value, thresholds);
        }
    }

    /// Thresholds registered after the record opened start counting from
    /// zero; earlier observations are not re-evaluated. A value repeated in
    /// `thresholds` is counted once.
    fn bump_thresholds(&mut self, value: f64, thresholds: &[f64]) {
        for (i, &threshold) in thresholds.iter().enumerate() {
            if thresholds[..i]
                .iter()
                .any(|t| t.to_bits() == threshold.to_bits())
            {
                continue;
            }
            let hit = u64::from(value > threshold);
            match self
                .thresholds
                .iter_mut()
                .find(|t| t.threshold.to_bits() == threshold.to_bits())
            {
                Some(entry) => entry.count += hit,
                None => self.thresholds.push(ThresholdCount {
                    threshold,
                    count: hit,
                }),
            }
        }
    }

    pub fn threshold_count(&self, threshold: f64) -> Option<u64> {
        self.thresholds
            .iter()
            .find(|t| t.threshold.to_bits() == threshold.to_bits())
            .map(|t| t.count)
    }

    /// Flat field mapping handed to the log sink. Parameters go in first so
    /// the aggregate fields win on a name collision.
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        for (name, value) in self.params.iter() {
            fields.insert(name.clone(), value.to_json());
        }
        fields.insert("count".into(), Value::from(self.count));
        if let Some(stats) = &self.stats {
            fields.insert("min".into(), Value::from(stats.min));
            fields.insert("max".into(), Value::from(stats.max));
            fields.insert("sum".into(), Value::from(stats.sum));
            fields.insert("average".into(), Value::from(stats.average));
        }
        for threshold in &self.thresholds {
            fields.insert(threshold.field_name(), Value::from(threshold.count));
        }
        fields.insert("is_metric".into(), Value::Bool(true));
        fields
    }
}

/// One window worth of aggregates. Records keep first-observation order.
#[derive(Debug, Default)]
pub struct Accumulator {
    index: HashMap<GroupingKey, usize>,
    records: Vec<AggregateRecord>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        tag: &str,
        value: f64,
        params: &Params,
        severity: Severity,
        kind: ObservationKind,
        thresholds: &[f64],
    ) {
        let key = GroupingKey::derive(tag, params, severity, kind);
        match self.index.get(&key) {
            Some(&slot) => self.records[slot].observe(value, thresholds),
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(AggregateRecord::new(
                    tag, params, severity, kind, value, thresholds,
                ));
            }
        }
    }

    /// Take every record of the window and leave the store empty.
    pub fn drain(&mut self) -> Vec<AggregateRecord> {
        self.index.clear();
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AggregateRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn measure(acc: &mut Accumulator, tag: &str, value: f64, params: &Params, thresholds: &[f64]) {
        acc.record(tag, value, params, Severity::Info, ObservationKind::Value, thresholds);
    }

    #[test]
    fn folds_values_into_min_max_sum_average() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        for v in [4.0, 8.0, 3.0, 9.0] {
            measure(&mut acc, "tap", v, &params, &[]);
        }

        let records = acc.drain();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.count, 4);
        let stats = record.stats.unwrap();
        assert_eq!(stats.min, 3.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.sum, 24.0);
        assert_relative_eq!(stats.average, 6.0);
        assert!(record.thresholds.is_empty());
    }

    #[test]
    fn nan_poisons_sum_and_average_only() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        for v in [1.0, f64::NAN, 3.0] {
            measure(&mut acc, "tap", v, &params, &[2.0]);
        }

        let record = &acc.records()[0];
        assert_eq!(record.count, 3);
        let stats = record.stats.unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert!(stats.sum.is_nan());
        assert!(stats.average.is_nan());
        assert_eq!(record.threshold_count(2.0), Some(1));

        let fields = record.fields();
        assert_eq!(fields.get("min"), Some(&Value::from(1.0)));
        assert_eq!(fields.get("max"), Some(&Value::from(3.0)));
        assert_eq!(fields.get("sum"), Some(&Value::Null));
        assert_eq!(fields.get("average"), Some(&Value::Null));
    }

    #[test]
    fn infinity_is_folded_like_any_value() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        measure(&mut acc, "tap", 2.0, &params, &[]);
        measure(&mut acc, "tap", f64::INFINITY, &params, &[]);

        let stats = acc.records()[0].stats.unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, f64::INFINITY);
        assert_eq!(stats.sum, f64::INFINITY);
        let fields = acc.records()[0].fields();
        assert_eq!(fields.get("max"), Some(&Value::Null));
        assert_eq!(fields.get("min"), Some(&Value::from(2.0)));
    }

    #[test]
    fn negative_values_are_accepted() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        for v in [-4.0, 2.0] {
            measure(&mut acc, "drift", v, &params, &[-1.0]);
        }

        let record = &acc.records()[0];
        let stats = record.stats.unwrap();
        assert_eq!(stats.min, -4.0);
        assert_eq!(stats.max, 2.0);
        assert_eq!(stats.sum, -2.0);
        assert_eq!(stats.average, -1.0);
        assert_eq!(record.threshold_count(-1.0), Some(1));
        assert_eq!(record.fields().get("above_-1"), Some(&Value::from(1u64)));
    }

    #[test]
    fn repeated_thresholds_count_once() {
        let mut acc = Accumulator::new();
        measure(&mut acc, "latency", 10.0, &Params::new(), &[5.0, 5.0]);
        let record = &acc.records()[0];
        assert_eq!(record.thresholds.len(), 1);
        assert_eq!(record.threshold_count(5.0), Some(1));
    }

    #[test]
    fn distinct_params_make_distinct_records() {
        let mut acc = Accumulator::new();
        measure(&mut acc, "tap", 4.0, &Params::new().with("user", "bela"), &[]);
        measure(&mut acc, "tap", 8.0, &Params::new().with("user", "bela"), &[]);
        measure(&mut acc, "tap", 18.0, &Params::new().with("user", "jano"), &[]);

        let records = acc.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].count, 2);
        assert_eq!(records[1].count, 1);
        assert_eq!(records[1].stats.unwrap().sum, 18.0);
    }

    #[test]
    fn events_carry_only_a_count() {
        let mut acc = Accumulator::new();
        let params = Params::new().with("apple", 2);
        acc.record("tap", 1.0, &params, Severity::Warn, ObservationKind::Event, &[5.0]);
        acc.record("tap", 1.0, &params, Severity::Warn, ObservationKind::Event, &[5.0]);

        let record = &acc.records()[0];
        assert_eq!(record.count, 2);
        assert!(record.stats.is_none());
        assert!(record.thresholds.is_empty());

        let fields = record.fields();
        assert_eq!(fields.get("count"), Some(&Value::from(2u64)));
        assert_eq!(fields.get("apple"), Some(&Value::from(2)));
        assert!(fields.get("min").is_none());
        assert!(fields.get("average").is_none());
    }

    #[test]
    fn counts_observations_above_each_threshold() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        let thresholds = [5.0, 10.0, 20.0, 1000.0];
        for v in [2.0, 3.0, 4.0, 6.0, 11.0, 12.0, 816.0] {
            measure(&mut acc, "latency", v, &params, &thresholds);
        }

        let record = &acc.records()[0];
        assert_eq!(record.threshold_count(5.0), Some(4));
        assert_eq!(record.threshold_count(10.0), Some(3));
        assert_eq!(record.threshold_count(20.0), Some(1));
        assert_eq!(record.threshold_count(1000.0), Some(0));

        let fields = record.fields();
        assert_eq!(fields.get("above_5"), Some(&Value::from(4u64)));
        assert_eq!(fields.get("above_1000"), Some(&Value::from(0u64)));
        assert_eq!(fields.get("is_metric"), Some(&Value::Bool(true)));
    }

    #[test]
    fn threshold_equal_to_value_is_not_exceeded() {
        let mut acc = Accumulator::new();
        measure(&mut acc, "latency", 5.0, &Params::new(), &[5.0]);
        assert_eq!(acc.records()[0].threshold_count(5.0), Some(0));
    }

    #[test]
    fn new_thresholds_count_from_when_they_appear() {
        let mut acc = Accumulator::new();
        let params = Params::new();
        measure(&mut acc, "latency", 50.0, &params, &[10.0]);
        measure(&mut acc, "latency", 50.0, &params, &[20.0]);

        let record = &acc.records()[0];
        assert_eq!(record.threshold_count(10.0), Some(1));
        assert_eq!(record.threshold_count(20.0), Some(1));
    }

    #[test]
    fn aggregate_fields_override_colliding_params() {
        let mut acc = Accumulator::new();
        measure(&mut acc, "tap", 3.0, &Params::new().with("count", "mine"), &[]);
        let fields = acc.records()[0].fields();
        assert_eq!(fields.get("count"), Some(&Value::from(1u64)));
    }

    #[test]
    fn drain_leaves_the_store_empty() {
        let mut acc = Accumulator::new();
        measure(&mut acc, "tap", 1.0, &Params::new(), &[]);
        assert_eq!(acc.drain().len(), 1);
        assert!(acc.is_empty());

        measure(&mut acc, "tap", 2.0, &Params::new(), &[]);
        let records = acc.drain();
        assert_eq!(records[0].count, 1);
        assert_eq!(records[0].stats.unwrap().sum, 2.0);
    }
}
