// Metric logger facade
// The operation surface callers use: measurements, severity counters,
// start/stop/cancel durations and threshold registration. Owns the window
// state behind a single mutex and the flush timer
//
// Numan Thabit 2025 Nov

use crate::aggregate::{
    Accumulator, IdGenerator, InFlightTable, ObservationKind, ThresholdRegistry, UuidGenerator,
};
use crate::clock::{Clock, SystemClock};
use crate::config::MetricLoggerConfig;
use crate::metrics::{FLUSHES, IN_FLIGHT, RECORDS_FLUSHED, SINK_ERRORS};
use crate::params::{Params, Severity};
use crate::scheduler::spawn_flush_loop;
use crate::sink::{Fields, JsonSink, LogSink};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const TOO_MANY_IN_PROGRESS_TAG: &str = "too-many-in-progress-measurements";
pub const DEPRECATED_COUNT_TAG: &str = "deprecated-count-method";

#[derive(Default)]
struct WindowState {
    accumulator: Accumulator,
    in_flight: InFlightTable,
    thresholds: ThresholdRegistry,
}

struct Inner {
    config: MetricLoggerConfig,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    runtime: Option<Handle>,
    state: Mutex<WindowState>,
    timer: Mutex<Option<JoinHandle<()>>>,
    armed: AtomicBool,
    closed: AtomicBool,
    count_deprecation_reported: AtomicBool,
    missing_runtime_reported: AtomicBool,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, severity: Severity, tag: &str, fields: &Fields) {
        if let Err(err) = self.sink.log(severity, tag, fields) {
            SINK_ERRORS
                .with_label_values(&[self.config.namespace.as_str()])
                .inc();
            warn!(
                namespace = %self.config.namespace,
                tag = %tag,
                error = %err,
                "metric sink write failed"
            );
        }
    }

    fn flush(&self) -> usize {
        // Drain under the lock, write to the sink outside it.
        let (records, in_progress) = {
            let mut state = self.state();
            (state.accumulator.drain(), state.in_flight.len())
        };
        let namespace = self.config.namespace.as_str();

        for record in &records {
            self.emit(record.severity, &record.tag, &record.fields());
            RECORDS_FLUSHED
                .with_label_values(&[namespace, record.severity.as_str()])
                .inc();
        }

        IN_FLIGHT
            .with_label_values(&[namespace])
            .set(in_progress as i64);
        let limit = self.config.in_progress_measurement_warning_limit;
        if in_progress > limit {
            let mut fields = Fields::new();
            fields.insert("in_progress".into(), Value::from(in_progress as u64));
            fields.insert("limit".into(), Value::from(limit as u64));
            self.emit(Severity::Warn, TOO_MANY_IN_PROGRESS_TAG, &fields);
        }

        FLUSHES.with_label_values(&[namespace]).inc();
        debug!(
            namespace = %namespace,
            records = records.len(),
            in_progress = in_progress,
            "flushed metric window"
        );
        records.len()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

/// Aggregating metric logger.
///
/// Cloning is cheap and every clone feeds the same window. Observations are
/// grouped by tag and parameters and emitted as one record per group at each
/// flush. Severity and observation kind are part of the group too: `info`,
/// `warn` and `measure` on the same tag and parameters give three records.
/// Flushes run on a tokio task pinned to the :30 mark of the wall-clock
/// minute; the task is started by the first recording call.
///
/// ```no_run
/// use aggregate_metric_logger::{MetricLogger, MetricLoggerConfig, Params};
///
/// # async fn demo() {
/// let metrics = MetricLogger::new(MetricLoggerConfig::default());
/// metrics.set_thresholds("db-query", [50.0, 200.0]);
///
/// let id = metrics.start("db-query", Params::new().with("table", "users"));
/// // ... run the query ...
/// metrics.stop(&id);
///
/// metrics.warn("cache-miss", Params::new());
/// # }
/// ```
#[derive(Clone)]
pub struct MetricLogger {
    inner: Arc<Inner>,
}

pub struct MetricLoggerBuilder {
    config: MetricLoggerConfig,
    sink: Option<Arc<dyn LogSink>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    runtime: Option<Handle>,
}

impl MetricLoggerBuilder {
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Runtime the flush task is spawned on. Defaults to the runtime of the
    /// first recording call.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> MetricLogger {
        let sink: Arc<dyn LogSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(JsonSink::stdout(self.config.namespace.clone())),
        };
        MetricLogger {
            inner: Arc::new(Inner {
                config: self.config,
                sink,
                clock: self.clock,
                ids: self.ids,
                runtime: self.runtime,
                state: Mutex::new(WindowState::default()),
                timer: Mutex::new(None),
                armed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                count_deprecation_reported: AtomicBool::new(false),
                missing_runtime_reported: AtomicBool::new(false),
            }),
        }
    }
}

impl MetricLogger {
    /// Logger writing JSON lines to stdout.
    pub fn new(config: MetricLoggerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: MetricLoggerConfig) -> MetricLoggerBuilder {
        MetricLoggerBuilder {
            config,
            sink: None,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            runtime: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    pub fn namespace(&self) -> &str {
        &self.inner.config.namespace
    }

    /// Whether the flush timer is pending.
    pub fn is_armed(&self) -> bool {
        self.inner.armed.load(Ordering::Acquire)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.state().in_flight.len()
    }

    /// Records accumulated in the current window.
    pub fn pending_records(&self) -> usize {
        self.inner.state().accumulator.len()
    }

    /// Fold a value into the `(tag, params)` series.
    pub fn measure(&self, tag: &str, value: f64, params: impl Into<Params>) {
        self.record(tag, value, params.into(), Severity::Info, ObservationKind::Value);
    }

    /// Same as [`MetricLogger::measure`]. Reports a deprecation notice on
    /// first use.
    #[deprecated(note = "use `measure` instead")]
    pub fn count(&self, tag: &str, value: f64, params: impl Into<Params>) {
        if !self.is_recording() {
            return;
        }
        if !self
            .inner
            .count_deprecation_reported
            .swap(true, Ordering::AcqRel)
        {
            let mut fields = Fields::new();
            fields.insert(
                "message".into(),
                Value::String("count() is deprecated, use measure() instead".into()),
            );
            self.inner
                .emit(Severity::Warn, DEPRECATED_COUNT_TAG, &fields);
        }
        self.measure(tag, value, params);
    }

    pub fn trace(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Trace, tag, params);
    }

    pub fn debug(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Debug, tag, params);
    }

    pub fn info(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Info, tag, params);
    }

    pub fn warn(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Warn, tag, params);
    }

    pub fn error(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Error, tag, params);
    }

    pub fn fatal(&self, tag: &str, params: impl Into<Params>) {
        self.event(Severity::Fatal, tag, params);
    }

    /// Count one occurrence of `tag` at `severity`.
    pub fn event(&self, severity: Severity, tag: &str, params: impl Into<Params>) {
        self.record(tag, 1.0, params.into(), severity, ObservationKind::Event);
    }

    /// Begin a duration measurement. The returned id is always usable with
    /// [`MetricLogger::stop`] and [`MetricLogger::cancel`], even when the
    /// logger is disabled.
    pub fn start(&self, tag: &str, params: impl Into<Params>) -> String {
        let id = self.inner.ids.new_id();
        if !self.is_recording() {
            return id;
        }
        self.ensure_armed();
        let now = self.inner.clock.now();
        let mut state = self.inner.state();
        if !self.inner.closed.load(Ordering::Acquire) {
            state.in_flight.begin(id.clone(), tag, params.into(), now);
        }
        id
    }

    /// Finish a measurement and fold its elapsed milliseconds into the
    /// window. Unknown, stopped or cancelled ids are ignored.
    pub fn stop(&self, id: &str) -> Option<f64> {
        if !self.is_recording() {
            return None;
        }
        let now = self.inner.clock.now();
        let elapsed = {
            let mut guard = self.inner.state();
            let state = &mut *guard;
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            let (measurement, elapsed) = state.in_flight.end(id, now)?;
            state.accumulator.record(
                &measurement.tag,
                elapsed,
                &measurement.params,
                Severity::Info,
                ObservationKind::Value,
                state.thresholds.get(&measurement.tag),
            );
            elapsed
        };
        self.ensure_armed();
        Some(elapsed)
    }

    /// Drop a measurement without recording it.
    pub fn cancel(&self, id: &str) -> bool {
        self.inner.state().in_flight.cancel(id)
    }

    /// Replace the thresholds for `tag`. Applies to observations from now on.
    pub fn set_thresholds(&self, tag: &str, thresholds: impl Into<Vec<f64>>) {
        self.inner.state().thresholds.set(tag, thresholds.into());
    }

    pub fn thresholds(&self, tag: &str) -> Vec<f64> {
        self.inner.state().thresholds.get(tag).to_vec()
    }

    /// Emit and clear the current window now. Returns the number of metric
    /// records emitted.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Stop the flush timer and emit what is left. Recording calls made
    /// afterwards are ignored.
    pub fn shutdown(&self) -> usize {
        // Closed under the window lock: a call that already holds it lands
        // before the final drain, later ones see the flag.
        {
            let _state = self.inner.state();
            self.inner.closed.store(true, Ordering::Release);
        }
        {
            let mut timer = self.inner.timer();
            self.inner.armed.store(false, Ordering::Release);
            if let Some(task) = timer.take() {
                task.abort();
            }
        }
        self.inner.flush()
    }

    fn is_recording(&self) -> bool {
        self.inner.config.enabled && !self.inner.closed.load(Ordering::Acquire)
    }

    fn record(
        &self,
        tag: &str,
        value: f64,
        params: Params,
        severity: Severity,
        kind: ObservationKind,
    ) -> bool {
        if !self.is_recording() {
            return false;
        }
        self.ensure_armed();
        let mut guard = self.inner.state();
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        let state = &mut *guard;
        state.accumulator.record(
            tag,
            value,
            &params,
            severity,
            kind,
            state.thresholds.get(tag),
        );
        true
    }

    fn ensure_armed(&self) {
        if self.inner.armed.load(Ordering::Acquire) {
            return;
        }
        let mut timer = self.inner.timer();
        if timer.is_some() || self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let handle = match self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        {
            Some(handle) => handle,
            None => {
                if !self
                    .inner
                    .missing_runtime_reported
                    .swap(true, Ordering::AcqRel)
                {
                    warn!(
                        namespace = %self.inner.config.namespace,
                        "no tokio runtime available; metrics flush only on explicit flush()"
                    );
                }
                return;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        *timer = Some(spawn_flush_loop(
            &handle,
            self.inner.clock.clone(),
            move || match weak.upgrade() {
                Some(inner) => {
                    inner.flush();
                    true
                }
                None => false,
            },
        ));
        self.inner.armed.store(true, Ordering::Release);
        debug!(namespace = %self.inner.config.namespace, "metric flush timer started");
    }
}
