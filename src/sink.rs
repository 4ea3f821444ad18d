// Log sinks
// Destinations for flushed metric records and diagnostics. The logger treats
// every sink as fire-and-forget; failures are reported back only so they can
// be counted
//
// Numan Thabit 2025 Nov

use crate::errors::MetricLoggerError;
use crate::params::Severity;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::Mutex;

pub type Fields = Map<String, Value>;

/// Structured logger consumed by [`crate::MetricLogger`].
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, tag: &str, fields: &Fields) -> Result<(), MetricLoggerError>;
}

/// Writes one JSON object per line:
/// `{"name":<namespace>,"action":<tag>,"level":<severity>,...fields}`.
pub struct JsonSink<W: Write + Send> {
    namespace: String,
    out: Mutex<W>,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout(namespace: impl Into<String>) -> Self {
        Self::new(namespace, std::io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(namespace: impl Into<String>, out: W) -> Self {
        Self {
            namespace: namespace.into(),
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> LogSink for JsonSink<W> {
    fn log(&self, severity: Severity, tag: &str, fields: &Fields) -> Result<(), MetricLoggerError> {
        let mut line = Map::with_capacity(fields.len() + 3);
        line.insert("name".into(), Value::String(self.namespace.clone()));
        line.insert("action".into(), Value::String(tag.to_string()));
        line.insert("level".into(), Value::String(severity.to_string()));
        for (k, v) in fields {
            line.insert(k.clone(), v.clone());
        }

        let mut encoded = serde_json::to_vec(&Value::Object(line))?;
        encoded.push(b'\n');
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(&encoded)?;
        out.flush()?;
        Ok(())
    }
}

/// Forwards records as `tracing` events. `fatal` maps to `ERROR`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    namespace: String,
}

impl TracingSink {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, tag: &str, fields: &Fields) -> Result<(), MetricLoggerError> {
        let fields = serde_json::to_string(fields)?;
        let namespace = self.namespace.as_str();
        match severity {
            Severity::Trace => tracing::trace!(namespace, %fields, "{tag}"),
            Severity::Debug => tracing::debug!(namespace, %fields, "{tag}"),
            Severity::Info => tracing::info!(namespace, %fields, "{tag}"),
            Severity::Warn => tracing::warn!(namespace, %fields, "{tag}"),
            Severity::Error => tracing::error!(namespace, %fields, "{tag}"),
            Severity::Fatal => tracing::error!(namespace, fatal = true, %fields, "{tag}"),
        }
        Ok(())
    }
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord {
    pub severity: Severity,
    pub tag: String,
    pub fields: Fields,
}

impl LoggedRecord {
    pub fn is_metric(&self) -> bool {
        self.fields.get("is_metric") == Some(&Value::Bool(true))
    }
}

/// Keeps every record in memory. Meant for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LoggedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LoggedRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<LoggedRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn metrics(&self) -> Vec<LoggedRecord> {
        self.records().into_iter().filter(|r| r.is_metric()).collect()
    }

    pub fn diagnostics(&self) -> Vec<LoggedRecord> {
        self.records().into_iter().filter(|r| !r.is_metric()).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, tag: &str, fields: &Fields) -> Result<(), MetricLoggerError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(LoggedRecord {
                severity,
                tag: tag.to_string(),
                fields: fields.clone(),
            });
        Ok(())
    }
}
