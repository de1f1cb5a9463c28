//! Process-wide circuit breaker (§3 `CircuitBreaker`, §4.8, §8 invariant 6).
//!
//! Unlike `h-5n1p3r`'s per-endpoint `EndpointHealth` tracker (which keeps a
//! rolling success-rate window per RPC endpoint), the funnel needs a single
//! shared breaker whose three states gate concurrency and stage caps across
//! the whole cycle, so the state machine here is the textbook
//! CLOSED/OPEN/HALF_OPEN one named in the design doc rather than the
//! teacher's per-endpoint degraded/cooling-down ladder.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Shared, single-writer circuit breaker. Callers serialize access the same
/// way they serialize `CostLedger` access (§5 "exactly two shared mutable
/// objects").
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure_time: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: BreakerState,
    half_open_trial_claimed: bool,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_count: 0,
            last_failure_time: None,
            failure_threshold,
            recovery_timeout,
            state: BreakerState::Closed,
            half_open_trial_claimed: false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Ask permission to make a call. OPEN denies until `recovery_timeout`
    /// has elapsed, at which point exactly one caller is let through as the
    /// HALF_OPEN trial (§8 invariant 6).
    pub fn try_acquire(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    debug!("circuit breaker recovery timeout elapsed, admitting half-open trial");
                    self.state = BreakerState::HalfOpen;
                    self.half_open_trial_claimed = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if self.half_open_trial_claimed {
                    false
                } else {
                    self.half_open_trial_claimed = true;
                    true
                }
            }
        }
    }

    /// Any successful batch from any stage calls this, resetting the count
    /// (§4.8).
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure_time = None;
        self.half_open_trial_claimed = false;
        self.state = BreakerState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            BreakerState::HalfOpen => {
                warn!("half-open trial failed, returning to open");
                self.state = BreakerState::Open;
                self.half_open_trial_claimed = false;
            }
            _ => {
                if self.failure_count >= self.failure_threshold {
                    warn!(
                        failure_count = self.failure_count,
                        "circuit breaker tripped to open"
                    );
                    self.state = BreakerState::Open;
                }
            }
        }
    }

    /// Stage-4 OHLCV semaphore capacity: `max(2, 10 - failure_count*2)`,
    /// capped at 10 (§4.2, §5).
    pub fn ohlcv_concurrency(&self) -> usize {
        let reduced = 10i64 - self.failure_count as i64 * 2;
        reduced.clamp(2, 10) as usize
    }

    /// Stage-3 backpressure cap: `max(5, base - failure_count*2)` (§4.5).
    pub fn max_stage4(&self, base: usize) -> usize {
        let reduced = base as i64 - self.failure_count as i64 * 2;
        reduced.max(5) as usize
    }

    pub fn is_open(&self) -> bool {
        self.state == BreakerState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_after_threshold_failures() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn half_open_allows_exactly_one_trial() {
        let mut cb = CircuitBreaker::new(2, Duration::from_millis(10));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.try_acquire()); // the one trial
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(!cb.try_acquire()); // no second concurrent trial
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let mut cb = CircuitBreaker::new(2, Duration::from_millis(10));
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.try_acquire());
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn half_open_failure_reopens_and_resets_timer() {
        let mut cb = CircuitBreaker::new(2, Duration::from_millis(10));
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.try_acquire());
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn ohlcv_concurrency_degrades_with_failures() {
        let mut cb = CircuitBreaker::new(10, Duration::from_secs(60));
        assert_eq!(cb.ohlcv_concurrency(), 10);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.ohlcv_concurrency(), 6);
    }

    #[test]
    fn max_stage4_floors_at_five() {
        let mut cb = CircuitBreaker::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            cb.record_failure();
        }
        assert_eq!(cb.max_stage4(10), 5);
    }
}
