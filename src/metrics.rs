// Metrics and observability module
// Self-instrumentation for the metric logger: flush cadence, emitted records,
// sink failures and open measurements, labelled by logger namespace
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec,
};

pub static FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "metric_logger_flushes_total",
        "completed flushes of the aggregation window",
        &["namespace"]
    )
    .expect("register metric_logger_flushes_total")
});

pub static RECORDS_FLUSHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "metric_logger_records_flushed_total",
        "aggregate records handed to the log sink",
        &["namespace", "severity"]
    )
    .expect("register metric_logger_records_flushed_total")
});

pub static SINK_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "metric_logger_sink_errors_total",
        "records the log sink failed to write",
        &["namespace"]
    )
    .expect("register metric_logger_sink_errors_total")
});

pub static IN_FLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "metric_logger_in_flight_measurements",
        "started but not yet stopped measurements at last flush",
        &["namespace"]
    )
    .expect("register metric_logger_in_flight_measurements")
});
