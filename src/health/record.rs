/// Per-endpoint failure record

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Point-in-time copy of a failure record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureState {
    pub count: u64,
    pub last_checked_at: Instant,
    pub force_check: bool,
}

/// Failure counter for one endpoint address
///
/// Count, last-check stamp and force-check flag always change together
/// under the record's own lock, so concurrent successes and failures on the
/// same endpoint never lose an update. Distinct endpoints never contend.
#[derive(Debug)]
pub struct FailureRecord {
    state: Mutex<FailureState>,
}

impl FailureRecord {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            state: Mutex::new(FailureState {
                count: 0,
                last_checked_at: now,
                force_check: false,
            }),
        }
    }

    pub fn snapshot(&self) -> FailureState {
        *self.state.lock()
    }

    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Decide whether a request may probe this endpoint, stamping the check
    /// time when it may
    pub(crate) fn claim_attempt(&self, now: Instant, request_seq: u64, max_check_period: Duration) -> bool {
        let mut state = self.state.lock();
        let due = state.count == 0
            || state.force_check
            || request_seq % repetition_rate(state.count) == 0
            || now.saturating_duration_since(state.last_checked_at) > max_check_period;
        if due {
            state.last_checked_at = now;
        }
        due
    }

    /// Reset the count; `observe` sees the previous count before the lock is released
    pub(crate) fn reset<F: FnOnce(u64)>(&self, now: Instant, observe: F) -> u64 {
        let mut state = self.state.lock();
        let previous = state.count;
        state.count = 0;
        state.force_check = false;
        state.last_checked_at = now;
        observe(previous);
        previous
    }

    /// Bump the count; `observe` sees the new count before the lock is released
    pub(crate) fn increment<F: FnOnce(u64)>(&self, observe: F) -> u64 {
        let mut state = self.state.lock();
        state.force_check = false;
        state.count = state.count.saturating_add(1);
        observe(state.count);
        state.count
    }

    pub(crate) fn set_force_check(&self, enabled: bool) {
        self.state.lock().force_check = enabled;
    }
}

/// How many requests pass between probes of an endpoint with `count` failures
///
/// Step function, capped at one probe per 100000 requests.
pub fn repetition_rate(count: u64) -> u64 {
    match count {
        0..=1 => 1,
        2..=9 => 2,
        10..=99 => 10,
        100..=999 => 100,
        1_000..=9_999 => 1_000,
        10_000..=99_999 => 10_000,
        _ => 100_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetition_rate_steps() {
        assert_eq!(repetition_rate(1), 1);
        assert_eq!(repetition_rate(2), 2);
        assert_eq!(repetition_rate(9), 2);
        assert_eq!(repetition_rate(10), 10);
        assert_eq!(repetition_rate(50), 10);
        assert_eq!(repetition_rate(100), 100);
        assert_eq!(repetition_rate(5_000), 1_000);
        assert_eq!(repetition_rate(99_999), 10_000);
        assert_eq!(repetition_rate(100_000), 100_000);
        assert_eq!(repetition_rate(u64::MAX), 100_000);
    }

    #[test]
    fn test_reset_and_increment_report_transitions() {
        let now = Instant::now();
        let record = FailureRecord::new(now);

        assert_eq!(record.increment(|_| {}), 1);
        assert_eq!(record.increment(|_| {}), 2);
        assert_eq!(record.reset(now, |_| {}), 2);
        assert_eq!(record.reset(now, |_| {}), 0);
    }

    #[test]
    fn test_observer_runs_under_the_record_lock() {
        let record = FailureRecord::new(Instant::now());
        let mut seen = Vec::new();

        record.increment(|count| {
            // Locked: a concurrent update could not have slipped in.
            assert!(record.state.try_lock().is_none());
            seen.push(count);
        });
        record.reset(Instant::now(), |previous| seen.push(previous));
        assert_eq!(seen, vec![1, 1]);
    }

    #[test]
    fn test_increment_clears_force_check() {
        let record = FailureRecord::new(Instant::now());
        record.set_force_check(true);
        assert!(record.snapshot().force_check);

        record.increment(|_| {});
        assert!(!record.snapshot().force_check);
    }
}
