/// Endpoint health tracking for failover decisions
///
/// Health here is passive: nothing probes nodes in the background. Each
/// routed request reports success or failure, and the tracker uses the
/// accumulated failure count to decide whether the next request should
/// spend a network call on a node that is presumed down.
pub mod record;

pub use record::{repetition_rate, FailureRecord, FailureState};

use crate::core::{SharedClock, SystemClock};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Default upper bound between two probes of a failing endpoint
pub const DEFAULT_MAX_FAILOVER_CHECK_PERIOD: Duration = Duration::from_secs(5 * 60);

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Emitted when an endpoint starts or stops failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub address: String,
    pub failing: bool,
}

/// Per-endpoint failure tracker
pub struct HealthTracker {
    records: DashMap<String, Arc<FailureRecord>>,
    max_failover_check_period: Duration,
    clock: SharedClock,
    notifier: broadcast::Sender<StatusChange>,
}

impl HealthTracker {
    pub fn new(max_failover_check_period: Duration) -> Self {
        Self::with_clock(max_failover_check_period, Arc::new(SystemClock))
    }

    pub fn with_clock(max_failover_check_period: Duration, clock: SharedClock) -> Self {
        let (notifier, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            records: DashMap::new(),
            max_failover_check_period,
            clock,
            notifier,
        }
    }

    /// Get the failure record for an address, creating it on first use
    pub fn get_or_create(&self, address: &str) -> Arc<FailureRecord> {
        if let Some(record) = self.records.get(address) {
            return Arc::clone(record.value());
        }
        let now = self.clock.now();
        self.records
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(FailureRecord::new(now)))
            .value()
            .clone()
    }

    /// Decide whether a request should contact this endpoint
    pub fn should_attempt(&self, address: &str, request_seq: u64, is_primary: bool) -> bool {
        let record = self.get_or_create(address);
        let attempt = record.claim_attempt(self.clock.now(), request_seq, self.max_failover_check_period);
        if !attempt {
            tracing::debug!(
                "Skipping {} endpoint {} (presumed down, {} failures)",
                if is_primary { "primary" } else { "secondary" },
                address,
                record.count()
            );
        }
        attempt
    }

    /// Notifications go out under the record's lock, so subscribers see
    /// an endpoint's transitions in the order they happened.
    pub fn record_success(&self, address: &str) {
        self.get_or_create(address).reset(self.clock.now(), |previous| {
            if previous != 0 {
                tracing::info!("Endpoint {} recovered after {} failures", address, previous);
                self.notify(address, false);
            }
        });
    }

    pub fn record_failure(&self, address: &str) {
        self.get_or_create(address).increment(|current| {
            if current == 1 {
                tracing::warn!("Endpoint {} is failing", address);
                self.notify(address, true);
            } else {
                tracing::debug!("Endpoint {} failure count is now {}", address, current);
            }
        });
    }

    /// Force (or stop forcing) a probe on the next request regardless of schedule
    pub fn force_check(&self, address: &str, enabled: bool) {
        self.get_or_create(address).set_force_check(enabled);
    }

    pub fn is_first_failure(&self, address: &str) -> bool {
        self.failure_count(address) == 0
    }

    pub fn failure_count(&self, address: &str) -> u64 {
        self.get_or_create(address).count()
    }

    pub fn last_checked_at(&self, address: &str) -> Instant {
        self.get_or_create(address).snapshot().last_checked_at
    }

    /// Number of distinct addresses ever seen
    pub fn tracked_endpoints(&self) -> usize {
        self.records.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.notifier.subscribe()
    }

    fn notify(&self, address: &str, failing: bool) {
        // No subscribers is fine.
        let _ = self.notifier.send(StatusChange {
            address: address.to_string(),
            failing,
        });
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILOVER_CHECK_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use tokio::sync::broadcast::error::TryRecvError;

    const NODE: &str = "http://node-a:8080";

    fn tracker_with_clock() -> (HealthTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let tracker = HealthTracker::with_clock(Duration::from_secs(300), clock.clone());
        (tracker, clock)
    }

    fn drain(rx: &mut broadcast::Receiver<StatusChange>) -> Vec<StatusChange> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(e) => panic!("unexpected channel state: {:?}", e),
            }
        }
    }

    #[test]
    fn test_failures_accumulate_with_single_failing_notification() {
        let tracker = HealthTracker::default();
        let mut rx = tracker.subscribe();

        for _ in 0..7 {
            tracker.record_failure(NODE);
        }

        assert_eq!(tracker.failure_count(NODE), 7);
        assert_eq!(
            drain(&mut rx),
            vec![StatusChange {
                address: NODE.to_string(),
                failing: true
            }]
        );
    }

    #[test]
    fn test_success_resets_with_single_recovered_notification() {
        let tracker = HealthTracker::default();
        tracker.record_failure(NODE);
        tracker.record_failure(NODE);
        let mut rx = tracker.subscribe();

        tracker.record_success(NODE);
        tracker.record_success(NODE);

        assert_eq!(tracker.failure_count(NODE), 0);
        assert_eq!(
            drain(&mut rx),
            vec![StatusChange {
                address: NODE.to_string(),
                failing: false
            }]
        );
    }

    #[test]
    fn test_success_on_healthy_endpoint_is_silent() {
        let tracker = HealthTracker::default();
        let mut rx = tracker.subscribe();
        tracker.record_success(NODE);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_healthy_endpoint_is_always_attempted() {
        let tracker = HealthTracker::default();
        for seq in 1..20 {
            assert!(tracker.should_attempt(NODE, seq, false));
        }
    }

    #[test]
    fn test_force_check_overrides_schedule() {
        let (tracker, _clock) = tracker_with_clock();
        for _ in 0..50 {
            tracker.record_failure(NODE);
        }
        assert!(!tracker.should_attempt(NODE, 7, true));

        tracker.force_check(NODE, true);
        assert!(tracker.should_attempt(NODE, 7, true));
        assert!(tracker.should_attempt(NODE, 8, true));

        tracker.force_check(NODE, false);
        assert!(!tracker.should_attempt(NODE, 9, true));
    }

    #[test]
    fn test_probe_schedule_for_fifty_failures() {
        let (tracker, _clock) = tracker_with_clock();
        for _ in 0..50 {
            tracker.record_failure(NODE);
        }
        assert_eq!(repetition_rate(50), 10);

        let probes: Vec<u64> = (41..=50)
            .filter(|seq| tracker.should_attempt(NODE, *seq, false))
            .collect();
        assert_eq!(probes, vec![50]);
    }

    #[test]
    fn test_max_check_period_forces_probe() {
        let (tracker, clock) = tracker_with_clock();
        for _ in 0..50 {
            tracker.record_failure(NODE);
        }
        assert!(!tracker.should_attempt(NODE, 3, false));

        clock.advance(Duration::from_secs(301));
        assert!(tracker.should_attempt(NODE, 3, false));
        // The probe stamped the record, so the window starts over.
        assert!(!tracker.should_attempt(NODE, 3, false));
    }

    #[test]
    fn test_should_attempt_stamps_last_check() {
        let (tracker, clock) = tracker_with_clock();
        let created = tracker.last_checked_at(NODE);
        clock.advance(Duration::from_secs(10));

        assert!(tracker.should_attempt(NODE, 1, true));
        assert_eq!(tracker.last_checked_at(NODE) - created, Duration::from_secs(10));
    }

    #[test]
    fn test_concurrent_transitions_are_notified_in_order() {
        let tracker = Arc::new(HealthTracker::default());
        let mut rx = tracker.subscribe();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for step in 0..8 {
                        if (worker + step) % 2 == 0 {
                            tracker.record_failure(NODE);
                        } else {
                            tracker.record_success(NODE);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = drain(&mut rx);
        assert!(!events.is_empty());
        for (index, event) in events.iter().enumerate() {
            assert_eq!(event.failing, index % 2 == 0, "event {} out of order", index);
        }
        let last = events.last().map(|event| event.failing);
        assert_eq!(last, Some(tracker.failure_count(NODE) > 0));
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let tracker = Arc::new(HealthTracker::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        tracker.record_failure(NODE);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.failure_count(NODE), 8_000);
        assert_eq!(tracker.tracked_endpoints(), 1);
    }
}
