//! Async runtime scheduling delay.
//!
//! A background task asks for a tick every `RESOLUTION` and records how late
//! each tick actually fires. A busy or blocked runtime shows up as growing
//! lateness.

use std::sync::{Arc, Weak};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::metrics::percentiles::DelayStats;

const RESOLUTION: Duration = Duration::from_millis(10);

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

type DelayHistogram = Arc<Mutex<Histogram<u64>>>;

pub struct LoopDelayMonitor {
    histogram: DelayHistogram,
}

impl LoopDelayMonitor {
    /// Starts the monitor on the current tokio runtime, if there is one.
    ///
    /// The task holds only a weak reference and exits once the monitor is
    /// dropped.
    pub fn start() -> Self {
        let histogram = Arc::new(Mutex::new(
            Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
        ));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(watch(Arc::downgrade(&histogram)));
                debug!(resolution_ms = RESOLUTION.as_millis() as u64, "loop delay monitor started");
            }
            Err(_) => debug!("no tokio runtime, loop delay monitor not started"),
        }

        Self { histogram }
    }

    /// Summarizes the ticks recorded since the previous call, then starts a
    /// new window.
    pub fn take_stats(&self) -> DelayStats {
        let mut hist = self.histogram.lock();
        let stats = DelayStats::from_histogram(&hist);
        hist.reset();
        stats
    }
}

async fn watch(histogram: Weak<Mutex<Histogram<u64>>>) {
    let mut interval = tokio::time::interval(RESOLUTION);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(interval);

    while let Some(scheduled) = ticks.next().await {
        let late = Instant::now().saturating_duration_since(scheduled);
        let Some(hist) = histogram.upgrade() else {
            break;
        };
        // Clamp to ≥ 1 μs so an on-time tick still counts.
        let _ = hist.lock().record((late.as_micros() as u64).max(HIST_LOW));
    }

    debug!("loop delay monitor stopped");
}
