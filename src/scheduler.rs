//! Poll scheduling and shutdown signals

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

use crate::error::{TracerError, TracerResult};

/// Fixed-period tick source.
///
/// The first tick completes immediately. A tick that is late because the
/// previous one overran is delivered at once, and later ticks stay on the
/// fixed period grid; missed ticks are skipped rather than bunched.
#[derive(Debug)]
pub struct PeriodicSchedule {
    interval: Interval,
    period: Duration,
    ticks: u64,
}

impl PeriodicSchedule {
    pub fn new(period: Duration) -> TracerResult<Self> {
        if period.is_zero() {
            return Err(TracerError::configuration("Tick period must be non-zero"));
        }
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Ok(Self {
            interval,
            period,
            ticks: 0,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick.
    pub async fn next_tick(&mut self) {
        self.interval.tick().await;
        self.ticks += 1;
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}. Only Ctrl+C will stop the bridge", e);
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => {
                        sig.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(
            PeriodicSchedule::new(Duration::ZERO),
            Err(TracerError::Configuration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_fixed_period() {
        let start = Instant::now();
        let mut schedule = PeriodicSchedule::new(Duration::from_millis(1000)).unwrap();

        schedule.next_tick().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        schedule.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        schedule.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert_eq!(schedule.ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_skips_missed_ticks() {
        let start = Instant::now();
        let mut schedule = PeriodicSchedule::new(Duration::from_millis(1000)).unwrap();
        schedule.next_tick().await;

        // a tick body that overran by two and a half periods
        tokio::time::sleep(Duration::from_millis(3500)).await;

        schedule.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(3500));
        schedule.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
        assert_eq!(schedule.ticks(), 3);
    }
}
