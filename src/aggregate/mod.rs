// Aggregation module - in-memory state behind a metric logger
// Grouping keys, per-tag thresholds, the per-window accumulator and the
// table of started but not yet stopped measurements
//
// Numan Thabit 2025 Nov

pub mod accumulator;
pub mod in_flight;
pub mod key;
pub mod thresholds;

pub use accumulator::{Accumulator, AggregateRecord, ObservationKind, ThresholdCount, ValueStats};
pub use in_flight::{IdGenerator, InFlightMeasurement, InFlightTable, UuidGenerator};
pub use key::GroupingKey;
pub use thresholds::ThresholdRegistry;
