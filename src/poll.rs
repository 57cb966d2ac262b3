//! Poll cycle
//!
//! One [`PollCycle::tick`] reads the three register blocks in order,
//! decodes them, folds the snapshot into the daily aggregate and publishes
//! the result. Any read failure skips the publish; the third consecutive
//! one (by default) terminates the cycle.
//!
//! ```text
//! Running --(success, or failure below threshold)--> Running
//! Running --(failure reaching threshold)-----------> Terminated
//! ```

use tracing::{debug, error, info, warn};

use crate::aggregate::DailyAggregate;
use crate::client::RegisterClient;
use crate::config::PollConfig;
use crate::decoder::{decode, TelemetrySnapshot};
use crate::error::{TracerError, TracerResult};
use crate::registers::CYCLE_BLOCKS;
use crate::scheduler::PeriodicSchedule;
use crate::service::publish;
use crate::sink::TelemetrySink;

/// Consecutive read failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
}

impl FailureCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Count one failure. Returns `true` once the threshold is reached.
    pub fn record_failure(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.is_exhausted()
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.threshold
    }
}

/// Lifecycle of a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Running,
    Terminated,
}

/// Result of a tick that did not terminate the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// All blocks read; the snapshot was published.
    Published(TelemetrySnapshot),
    /// A read failed; nothing was published.
    Skipped {
        consecutive_failures: u32,
        error: TracerError,
    },
}

/// The read-decode-publish loop for one controller.
pub struct PollCycle<C: RegisterClient, S: TelemetrySink> {
    client: C,
    sink: S,
    config: PollConfig,
    failures: FailureCounter,
    aggregate: DailyAggregate,
    state: CycleState,
}

impl<C: RegisterClient, S: TelemetrySink> PollCycle<C, S> {
    /// The sink must already hold the service paths
    /// (see [`register_service`](crate::service::register_service)).
    pub fn new(client: C, sink: S, config: PollConfig) -> Self {
        Self {
            client,
            sink,
            failures: FailureCounter::new(config.failure_threshold),
            config,
            aggregate: DailyAggregate::new(),
            state: CycleState::Running,
        }
    }

    /// Run one tick.
    ///
    /// Returns [`TracerError::FailuresExhausted`] on the failure that
    /// reaches the threshold and [`TracerError::Terminated`] on any call
    /// after that. Sink errors are logged and do not fail the tick.
    pub async fn tick(&mut self) -> TracerResult<TickOutcome> {
        if self.state == CycleState::Terminated {
            return Err(TracerError::Terminated);
        }

        let [realtime, status, statistics] = match self.read_blocks().await {
            Ok(blocks) => blocks,
            Err(e) => return self.on_read_failure(e),
        };

        if self.failures.count() > 0 {
            info!(
                "Controller responding again after {} failed read(s)",
                self.failures.count()
            );
        }
        self.failures.reset();

        let snapshot = decode(&realtime, &status, &statistics);
        if self.aggregate.observe(&snapshot) {
            debug!("New daily peak: {:.2}W", self.aggregate.max_power_today);
        }
        debug!(
            "Battery {:.2}V {:.2}A, PV {:.2}V {:.2}W, state {}",
            snapshot.dc_voltage,
            snapshot.dc_current,
            snapshot.pv_voltage,
            snapshot.yield_power,
            snapshot.operating_state
        );

        if let Err(e) = publish(&mut self.sink, &snapshot, &self.aggregate) {
            warn!("Failed to publish telemetry: {}", e);
        }
        Ok(TickOutcome::Published(snapshot))
    }

    /// Tick on the configured period until the cycle terminates.
    ///
    /// Only returns on error, normally [`TracerError::FailuresExhausted`].
    pub async fn run(&mut self) -> TracerResult<()> {
        let mut schedule = PeriodicSchedule::new(self.config.interval())?;
        info!(
            "Polling every {}ms, giving up after {} consecutive failures",
            self.config.interval_ms,
            self.failures.threshold()
        );

        loop {
            schedule.next_tick().await;
            self.tick().await?;
        }
    }

    /// Read all blocks of one tick. The first failure aborts the rest.
    async fn read_blocks(&mut self) -> TracerResult<[Vec<u16>; 3]> {
        let delay = self.config.inter_read_delay();
        let mut blocks: [Vec<u16>; 3] = Default::default();

        for (index, block) in CYCLE_BLOCKS.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let registers = self.client.read_block(block.address, block.count).await?;
            block.validate(&registers)?;
            blocks[index] = registers;
        }
        Ok(blocks)
    }

    fn on_read_failure(&mut self, err: TracerError) -> TracerResult<TickOutcome> {
        if self.failures.record_failure() {
            self.state = CycleState::Terminated;
            error!(
                "{} consecutive read failures, stopping: {}",
                self.failures.count(),
                err
            );
            return Err(TracerError::FailuresExhausted {
                count: self.failures.count(),
                last: Box::new(err),
            });
        }

        warn!(
            "Read failed ({}/{}), skipping publish: {}",
            self.failures.count(),
            self.failures.threshold(),
            err
        );
        Ok(TickOutcome::Skipped {
            consecutive_failures: self.failures.count(),
            error: err,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.count()
    }

    pub fn aggregate(&self) -> &DailyAggregate {
        &self.aggregate
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (C, S) {
        (self.client, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceIdentity;
    use crate::registers::{realtime, status};
    use crate::service::{paths, register_service};
    use crate::sink::MemorySink;
    use crate::status::OperatingState;
    use crate::value::SinkValue;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Register client replaying prepared results.
    #[derive(Default)]
    struct MockClient {
        requests: Vec<(u16, u16)>,
        responses: VecDeque<TracerResult<Vec<u16>>>,
    }

    impl MockClient {
        fn new() -> Self {
            Self::default()
        }

        fn push(&mut self, response: TracerResult<Vec<u16>>) -> &mut Self {
            self.responses.push_back(response);
            self
        }

        /// Queue a full successful cycle.
        fn push_cycle(&mut self, realtime: Vec<u16>, status: Vec<u16>) -> &mut Self {
            self.push(Ok(realtime)).push(Ok(status)).push(Ok(vec![0; 20]))
        }

        fn push_failure(&mut self) -> &mut Self {
            self.push(Err(TracerError::timeout("No response from slave 1", 200)))
        }
    }

    impl RegisterClient for MockClient {
        fn read_block(
            &mut self,
            address: u16,
            count: u16,
        ) -> impl Future<Output = TracerResult<Vec<u16>>> + Send {
            self.requests.push((address, count));
            let response = self
                .responses
                .pop_front()
                .unwrap_or_else(|| Err(TracerError::connection("No response prepared in mock")));
            async move { response }
        }
    }

    fn realtime_with_power(raw_power: u16) -> Vec<u16> {
        let mut block = vec![0; 18];
        block[realtime::BATTERY_VOLTAGE] = 1325;
        block[realtime::PV_POWER_LO] = raw_power;
        block
    }

    fn cycle(client: MockClient) -> PollCycle<MockClient, MemorySink> {
        let mut sink = MemorySink::new();
        register_service(&mut sink, &DeviceIdentity::default(), "epever-bridge", "ttyUSB0")
            .unwrap();
        PollCycle::new(client, sink, PollConfig::default())
    }

    #[tokio::test]
    async fn test_successful_tick_reads_blocks_in_order_and_publishes() {
        let mut client = MockClient::new();
        client.push_cycle(realtime_with_power(500), vec![0, 0b0100, 0]);
        let mut cycle = cycle(client);

        let outcome = cycle.tick().await.unwrap();
        let TickOutcome::Published(snapshot) = outcome else {
            panic!("expected a published snapshot");
        };
        assert_eq!(snapshot.operating_state, OperatingState::Float);
        assert_eq!(
            cycle.client().requests,
            vec![(0x3100, 18), (0x3200, 3), (0x3300, 20)]
        );
        assert_eq!(cycle.sink().commit_count(), 2);
        assert_eq!(cycle.sink().committed(paths::STATE), Some(&SinkValue::Int(5)));
        assert_eq!(
            cycle.sink().committed(paths::TODAY_MAX_POWER),
            Some(&SinkValue::Float(5.0))
        );
    }

    #[tokio::test]
    async fn test_counter_resets_on_success() {
        let mut client = MockClient::new();
        client.push_failure().push_failure();
        client.push_cycle(realtime_with_power(0), vec![0; 3]);
        client.push_failure().push_failure();
        let mut cycle = cycle(client);

        for expected_failures in [1, 2, 0, 1, 2] {
            cycle.tick().await.unwrap();
            assert_eq!(cycle.consecutive_failures(), expected_failures);
            assert_eq!(cycle.state(), CycleState::Running);
        }
    }

    #[tokio::test]
    async fn test_third_consecutive_failure_terminates() {
        let mut client = MockClient::new();
        client.push_failure().push_failure().push_failure();
        let mut cycle = cycle(client);

        assert!(matches!(
            cycle.tick().await,
            Ok(TickOutcome::Skipped {
                consecutive_failures: 1,
                ..
            })
        ));
        assert!(cycle.tick().await.is_ok());

        let err = cycle.tick().await.unwrap_err();
        assert!(matches!(err, TracerError::FailuresExhausted { count: 3, .. }));
        assert!(err.is_fatal());
        assert_eq!(cycle.state(), CycleState::Terminated);

        // no further reads once terminated
        let reads = cycle.client().requests.len();
        assert_eq!(cycle.tick().await, Err(TracerError::Terminated));
        assert_eq!(cycle.client().requests.len(), reads);
        assert_eq!(cycle.sink().commit_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_last_read_publishes_nothing() {
        let mut client = MockClient::new();
        client
            .push(Ok(realtime_with_power(900)))
            .push(Ok(vec![0; 3]))
            .push_failure();
        let mut cycle = cycle(client);

        let outcome = cycle.tick().await.unwrap();
        assert!(matches!(outcome, TickOutcome::Skipped { .. }));
        assert_eq!(cycle.client().requests.len(), 3);
        assert_eq!(cycle.sink().commit_count(), 1);
        assert_eq!(cycle.sink().get(paths::DC_VOLTAGE), Some(&SinkValue::Empty));
        assert_eq!(*cycle.aggregate(), DailyAggregate::default());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining_reads() {
        let mut client = MockClient::new();
        client.push_failure();
        let mut cycle = cycle(client);

        cycle.tick().await.unwrap();
        assert_eq!(cycle.client().requests, vec![(0x3100, 18)]);
    }

    #[tokio::test]
    async fn test_short_block_counts_as_failure() {
        let mut client = MockClient::new();
        client.push(Ok(realtime_with_power(0))).push(Ok(vec![0, 0]));
        let mut cycle = cycle(client);

        let outcome = cycle.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Skipped {
                consecutive_failures: 1,
                error: TracerError::BlockLength {
                    address: 0x3200,
                    expected: 3,
                    actual: 2,
                },
            }
        );
        assert_eq!(cycle.client().requests.len(), 2);
    }

    #[tokio::test]
    async fn test_daily_peak_is_monotonic_across_ticks() {
        let mut client = MockClient::new();
        for raw in [300, 700, 200, 900, 500] {
            client.push_cycle(realtime_with_power(raw), vec![0; 3]);
        }
        let mut cycle = cycle(client);

        let mut peaks = Vec::new();
        for _ in 0..5 {
            cycle.tick().await.unwrap();
            peaks.push(cycle.aggregate().max_power_today);
        }
        assert_eq!(peaks, vec![3.0, 7.0, 7.0, 9.0, 9.0]);
    }

    #[tokio::test]
    async fn test_failure_leaves_peak_untouched() {
        let mut client = MockClient::new();
        client.push_cycle(realtime_with_power(700), vec![0; 3]);
        client.push_failure();
        let mut cycle = cycle(client);

        cycle.tick().await.unwrap();
        cycle.tick().await.unwrap();
        assert_eq!(cycle.aggregate().max_power_today, 7.0);
        assert_eq!(
            cycle.sink().committed(paths::TODAY_MAX_POWER),
            Some(&SinkValue::Float(7.0))
        );
    }

    #[tokio::test]
    async fn test_sink_error_does_not_count_as_failure() {
        let mut client = MockClient::new();
        client.push_cycle(realtime_with_power(100), vec![0; 3]);
        // sink without registered paths rejects every write
        let mut cycle = PollCycle::new(client, MemorySink::new(), PollConfig::default());

        assert!(matches!(cycle.tick().await, Ok(TickOutcome::Published(_))));
        assert_eq!(cycle.consecutive_failures(), 0);
        assert_eq!(cycle.sink().commit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_threshold() {
        let mut client = MockClient::new();
        client.push_cycle(realtime_with_power(100), vec![0; 3]);
        client.push_cycle(realtime_with_power(200), vec![0; 3]);
        client.push_failure().push_failure().push_failure();
        let mut cycle = cycle(client);

        let start = Instant::now();
        let err = cycle.run().await.unwrap_err();
        assert!(matches!(err, TracerError::FailuresExhausted { count: 3, .. }));
        // ticks at 0, 1, 2, 3 and 4 seconds
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
        assert_eq!(cycle.sink().commit_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_read_delay() {
        let mut client = MockClient::new();
        client.push_cycle(realtime_with_power(0), vec![0; 3]);
        let mut cycle = PollCycle::new(
            client,
            MemorySink::new(),
            PollConfig::new().with_inter_read_delay_ms(50),
        );

        let start = Instant::now();
        cycle.tick().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn test_failure_counter() {
        let mut counter = FailureCounter::new(3);
        assert!(!counter.record_failure());
        assert!(!counter.record_failure());
        counter.reset();
        assert_eq!(counter.count(), 0);
        assert!(!counter.record_failure());
        assert!(!counter.record_failure());
        assert!(counter.record_failure());
        assert!(counter.is_exhausted());
        assert_eq!(FailureCounter::new(0).threshold(), 1);
    }
}
