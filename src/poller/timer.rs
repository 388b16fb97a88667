use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Counts poll timers that are currently alive.
///
/// Every [`PollTimer`] increments it on creation and decrements it on drop,
/// so a count of zero after teardown means no background tick survives.
#[derive(Debug, Clone, Default)]
pub struct TimerGauge(Arc<AtomicUsize>);

impl TimerGauge {
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A repeating poll timer, held while the poller is `Polling`.
///
/// The first tick fires one full period after creation. Dropping the
/// timer releases it; there is no other way to stop it.
#[derive(Debug)]
pub struct PollTimer {
    interval: Interval,
    gauge: TimerGauge,
}

impl PollTimer {
    pub fn start(period: Duration, gauge: &TimerGauge) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = interval_at(Instant::now() + period, period);
        // A tick that lands while a fetch is still running waits for it
        // instead of firing a burst afterwards.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        gauge.0.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(?period, "poll timer acquired");
        Self {
            interval,
            gauge: gauge.clone(),
        }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.gauge.0.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("poll timer released");
    }
}

/// Resolves on the next tick of `timer`, or never when there is none.
pub async fn next_tick(timer: &mut Option<PollTimer>) {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}
