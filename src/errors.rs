// Error types and error handling module
// This file defines the error type shared by configuration loading and
// the log sinks that receive flushed metric records
//
// Numan Thabit 2025 Nov

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricLoggerError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_read_as_sink_errors() {
        let err: MetricLoggerError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(err, MetricLoggerError::Io(_)));
        assert_eq!(err.to_string(), "sink io error: closed");
    }
}
