use std::{future::Future, time::Duration};

use log::{debug, info};
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sampling interval must be at least one second, got {0:?}")]
pub struct IntervalTooShort(pub Duration);

/// Drives a task on a single timeline: once on start, then once per period,
/// until shut down. A run that overshoots the period pushes the next one back
/// instead of overlapping it.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Result<Scheduler, IntervalTooShort> {
        if period < Duration::from_secs(1) {
            return Err(IntervalTooShort(period));
        }
        Ok(Scheduler { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the number of completed runs once `shutdown` resolves.
    /// Shutdown is only observed between runs; a run in flight always
    /// finishes.
    ///
    /// `shutdown` is polled once before the first run so that listeners
    /// which register on first poll, such as `tokio::signal::ctrl_c`, are
    /// armed for the whole first run too.
    pub async fn run<F, Fut, S>(&self, mut task: F, shutdown: S) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        if futures::poll!(&mut shutdown).is_ready() {
            info!("Shutdown requested before the first run");
            return 0;
        }
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        interval.tick().await;
        task().await;
        let mut runs = 1;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping scheduler after {} run(s)", runs);
                    break;
                }
                _ = interval.tick() => {
                    debug!("Scheduler tick, starting run {}", runs + 1);
                }
            }
            task().await;
            runs += 1;
        }
        runs
    }
}
