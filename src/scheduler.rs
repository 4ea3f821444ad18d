// Flush scheduler
// A single self re-arming timer pinned to the wall clock. Each fire
// recomputes the next deadline from the live clock, so slow flushes never
// accumulate drift across windows
//
// Numan Thabit 2025 Nov

use crate::clock::Clock;
use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Next flush instant for a wall-clock reading: the :30 mark of the current
/// minute while before it, otherwise the :30 mark of the following minute.
pub fn next_flush_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    let minute_start = now
        .duration_trunc(TimeDelta::minutes(1))
        .ok()
        .or_else(|| now.with_second(0).and_then(|t| t.with_nanosecond(0)))
        .unwrap_or(now);
    let offset = if now.second() >= 30 { 90 } else { 30 };
    minute_start + TimeDelta::seconds(offset)
}

/// How long to sleep from `now` until the next flush.
pub fn time_until_next_flush(now: DateTime<Utc>) -> Duration {
    (next_flush_deadline(now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Spawn the flush loop. `on_fire` runs at every deadline and returns
/// `false` once the owner is gone, which ends the task.
pub(crate) fn spawn_flush_loop<F>(
    handle: &Handle,
    clock: Arc<dyn Clock>,
    mut on_fire: F,
) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    handle.spawn(async move {
        loop {
            let now = clock.now();
            let wait = time_until_next_flush(now);
            debug!(
                deadline = %next_flush_deadline(now),
                wait_ms = wait.as_millis() as u64,
                "metric flush armed"
            );
            tokio::time::sleep(wait).await;
            if !on_fire() {
                debug!("metric logger dropped; flush loop exiting");
                break;
            }
        }
    })
}
