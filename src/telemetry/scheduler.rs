use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::config::FlushSchedule;

/// Periodic flush trigger. Started lazily and stopped with the session; once
/// the session is cancelled it is never restarted.
pub struct FlushScheduler {
    schedule: FlushSchedule,
    runtime: Handle,
    shutdown: CancellationToken,
    started: Arc<AtomicBool>,
}

/// Marks the timer stopped when its task exits, including by panic.
struct RunningMark(Arc<AtomicBool>);

impl Drop for RunningMark {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FlushScheduler {
    pub fn new(schedule: FlushSchedule, runtime: Handle, shutdown: CancellationToken) -> Self {
        Self {
            schedule,
            runtime,
            shutdown,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the timer on the first call. `on_tick` returns false to end the
    /// loop (the owner has gone away). Returns true if this call started it.
    pub fn ensure_started<F>(&self, on_tick: F) -> bool
    where
        F: Fn() -> bool + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return false;
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let period = self.schedule.interval();
        let tolerance = self.schedule.tolerance();
        let shutdown = self.shutdown.clone();
        let mark = RunningMark(self.started.clone());

        self.runtime.spawn(async move {
            let _mark = mark;
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(?period, ?tolerance, "periodic flush timer started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    scheduled = cadence.tick() => {
                        let lateness = Instant::now().saturating_duration_since(scheduled);
                        if lateness > tolerance {
                            debug!(?lateness, "periodic flush tick late");
                        } else {
                            trace!("periodic flush tick");
                        }
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }

            debug!("periodic flush timer stopped");
        });

        true
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn scheduler(interval_ms: u64) -> FlushScheduler {
        let schedule = FlushSchedule {
            interval_ms,
            tolerance_ms: 0,
        };
        FlushScheduler::new(schedule, Handle::current(), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_no_op() {
        let timer = scheduler(1_000);
        assert!(timer.ensure_started(|| true));
        assert!(!timer.ensure_started(|| true));
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn owner_gone_marks_timer_stopped() {
        let timer = scheduler(1_000);
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = ticks.clone();
        timer.ensure_started(move || seen.fetch_add(1, Ordering::SeqCst) < 2);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!timer.is_running(), "an exited loop must not report running");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_prevents_start() {
        let timer = scheduler(1_000);
        timer.stop();
        assert!(!timer.ensure_started(|| true));
        assert!(!timer.is_running());
    }
}
