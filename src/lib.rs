// Library root module for aggregate-metric-logger
// In-process metric aggregation: measurements and event counts are grouped
// by tag and parameters, summarised per wall-clock aligned window and emitted
// as one structured log record per group
//
// Numan Thabit 2025 Nov

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod params;
pub mod scheduler;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MetricLoggerConfig;
pub use errors::MetricLoggerError;
pub use logger::{MetricLogger, MetricLoggerBuilder};
pub use params::{ParamValue, Params, Severity};
pub use sink::{JsonSink, LogSink, MemorySink, TracingSink};
