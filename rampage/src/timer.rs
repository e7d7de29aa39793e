use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Fixed-rate ticker for the ramp controller.
pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            last_tick,
            interval_dur,
        }
    }

    /// Waits for the next tick and returns the time since the previous one.
    pub async fn tick(&mut self) -> Duration {
        let next = self.interval.tick().await;
        let elapsed = next.duration_since(self.last_tick);
        self.last_tick = next;

        if elapsed > self.interval_dur * 2 {
            warn!(
                "Controller tick delayed by {}; ramp targets may lag.",
                humantime::format_duration(elapsed - self.interval_dur)
            );
        }

        elapsed
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_fixed_rate() {
        let mut timer = Timer::new(Duration::from_millis(100)).await;
        assert_eq!(timer.to_string(), "100ms");

        let start = Instant::now();
        for _ in 0..10 {
            assert_eq!(timer.tick().await, Duration::from_millis(100));
        }
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
