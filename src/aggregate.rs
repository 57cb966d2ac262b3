//! Daily aggregate: today's yield and the running peak PV power.

use crate::decoder::TelemetrySnapshot;

/// Values accumulated across cycles.
///
/// Both fields start at zero. `max_power_today` is monotonically
/// non-decreasing for the lifetime of the value; nothing resets it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailyAggregate {
    /// Energy generated today (kWh), taken from the latest snapshot
    pub yield_today: f64,
    /// Highest `yield_power` seen (W)
    pub max_power_today: f64,
}

impl DailyAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one successful snapshot in. Returns `true` when a new peak was set.
    pub fn observe(&mut self, snapshot: &TelemetrySnapshot) -> bool {
        self.yield_today = snapshot.daily_yield;
        if snapshot.yield_power > self.max_power_today {
            self.max_power_today = snapshot.yield_power;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn snapshot_with_power(power: f64) -> TelemetrySnapshot {
        let mut snapshot = decode(&[0; 18], &[0; 3], &[0; 20]);
        snapshot.yield_power = power;
        snapshot
    }

    #[test]
    fn test_peak_is_monotonic() {
        let mut aggregate = DailyAggregate::new();
        let mut peaks = Vec::new();
        for power in [3.0, 7.0, 2.0, 9.0, 5.0] {
            aggregate.observe(&snapshot_with_power(power));
            peaks.push(aggregate.max_power_today);
        }
        assert_eq!(peaks, vec![3.0, 7.0, 7.0, 9.0, 9.0]);
    }

    #[test]
    fn test_observe_reports_new_peak() {
        let mut aggregate = DailyAggregate::new();
        assert!(!aggregate.observe(&snapshot_with_power(0.0)));
        assert!(aggregate.observe(&snapshot_with_power(1.5)));
        assert!(!aggregate.observe(&snapshot_with_power(1.5)));
    }

    #[test]
    fn test_yield_today_follows_latest_snapshot() {
        let mut aggregate = DailyAggregate::new();
        let mut snapshot = snapshot_with_power(0.0);
        snapshot.daily_yield = 1.25;
        aggregate.observe(&snapshot);
        assert_eq!(aggregate.yield_today, 1.25);
        assert_eq!(aggregate.max_power_today, 0.0);
    }
}
