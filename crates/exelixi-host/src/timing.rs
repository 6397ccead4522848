//! Host and device timing.
//!
//! Host time comes from a monotonic clock anchored at first use. Device time
//! comes from event profiling counters, which are nanoseconds on the device's
//! own clock. Only differences between readings of the same clock are
//! meaningful.

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::driver::{ClDriver, ProfilingParam};
use crate::error::{HostError, Result};

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed since an arbitrary, process-local origin.
pub fn now() -> f64 {
    ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Block the calling thread for `ms` milliseconds.
pub fn wait_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

fn profiling_counter<D: ClDriver>(
    driver: &D,
    event: &D::Event,
    param: ProfilingParam,
) -> Result<u64> {
    driver.event_profiling_info(event, param).map_err(|status| {
        warn!(?param, %status, "event profiling query failed");
        HostError::driver(status, "failed to query event profiling info")
    })
}

/// `(start, end)` profiling counters of one event.
pub fn event_interval<D: ClDriver>(driver: &D, event: &D::Event) -> Result<(u64, u64)> {
    let start = profiling_counter(driver, event, ProfilingParam::Start)?;
    let end = profiling_counter(driver, event, ProfilingParam::End)?;
    Ok((start, end))
}

/// Device execution time of one completed command, in nanoseconds.
pub fn elapsed<D: ClDriver>(driver: &D, event: &D::Event) -> Result<u64> {
    let (start, end) = event_interval(driver, event)?;
    Ok(end.saturating_sub(start))
}

/// Wall-clock span covered by a set of commands: latest end minus earliest
/// start, in nanoseconds. Any failed query fails the whole span; an empty
/// set spans nothing.
pub fn elapsed_span<D: ClDriver>(driver: &D, events: &[D::Event]) -> Result<u64> {
    let intervals = events
        .iter()
        .map(|event| event_interval(driver, event))
        .collect::<Result<Vec<_>>>()?;
    Ok(span_of(&intervals))
}

/// `max(end) - min(start)` over `(start, end)` intervals, 0 when empty.
pub fn span_of(intervals: &[(u64, u64)]) -> u64 {
    let min_start = intervals.iter().map(|&(start, _)| start).min();
    let max_end = intervals.iter().map(|&(_, end)| end).max();
    match (min_start, max_end) {
        (Some(start), Some(end)) => end.saturating_sub(start),
        _ => 0,
    }
}
