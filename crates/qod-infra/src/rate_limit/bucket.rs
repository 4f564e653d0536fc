use std::time::Duration;
use tokio::time::Instant;

/// Admission-control bookkeeping for a single client.
///
/// `tokens` stays within `[0, capacity]` of the [`TokenBucket`] that manages it.
#[derive(Debug, Clone)]
pub struct ClientState {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientState {
    /// A fresh client starts with a full bucket.
    pub fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_seen = self.last_seen.max(now);
    }

    /// How long this client has gone without a request.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Result of asking the limiter to admit one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Admitted {
        /// Whole tokens left after this request
        remaining: u32,
    },
    Rejected {
        /// Time until one full token will be available
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Continuous-refill token bucket parameters.
///
/// Pure logic: the bucket owns no state and reads no clock, callers pass both
/// the [`ClientState`] and the current instant.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn refill(&self, state: &mut ClientState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        let tokens_to_add = elapsed * self.refill_rate;

        state.tokens = (state.tokens + tokens_to_add).min(self.capacity);
        state.last_refill = state.last_refill.max(now);
    }

    /// Refill, then try to take one token.
    pub fn try_consume(&self, state: &mut ClientState, now: Instant) -> Admission {
        self.refill(state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Admission::Admitted {
                remaining: state.tokens.floor() as u32,
            }
        } else {
            Admission::Rejected {
                retry_after: self.time_until_next_token(state),
            }
        }
    }

    pub fn time_until_next_token(&self, state: &ClientState) -> Duration {
        if state.tokens >= 1.0 {
            Duration::from_secs(0)
        } else {
            let tokens_needed = 1.0 - state.tokens;
            let seconds = tokens_needed / self.refill_rate;
            // Saturates for refill rates too small to express as a Duration
            Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let bucket = TokenBucket::new(5.0, 2.0);
        let now = Instant::now();
        let mut state = ClientState::new(bucket.capacity(), now);

        for expected_remaining in (0..5).rev() {
            assert_eq!(
                bucket.try_consume(&mut state, now),
                Admission::Admitted {
                    remaining: expected_remaining
                }
            );
        }

        match bucket.try_consume(&mut state, now) {
            Admission::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(500));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(state.tokens(), 0.0);
    }

    #[test]
    fn test_refill_is_continuous() {
        let bucket = TokenBucket::new(5.0, 2.0);
        let start = Instant::now();
        let mut state = ClientState::new(bucket.capacity(), start);
        for _ in 0..5 {
            bucket.try_consume(&mut state, start);
        }

        // A quarter second buys half a token: still not enough
        let quarter = start + Duration::from_millis(250);
        assert!(!bucket.try_consume(&mut state, quarter).is_admitted());
        assert!((state.tokens() - 0.5).abs() < 1e-9);

        // Another quarter second completes the token
        let half = start + Duration::from_millis(500);
        assert!(bucket.try_consume(&mut state, half).is_admitted());
        assert!(!bucket.try_consume(&mut state, half).is_admitted());
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let bucket = TokenBucket::new(3.0, 10.0);
        let start = Instant::now();
        let mut state = ClientState::new(bucket.capacity(), start);
        bucket.try_consume(&mut state, start);

        bucket.refill(&mut state, start + Duration::from_secs(3600));
        assert_eq!(state.tokens(), 3.0);
        assert_eq!(state.last_refill(), start + Duration::from_secs(3600));
    }

    #[test]
    fn test_clock_going_backwards_adds_nothing() {
        let bucket = TokenBucket::new(2.0, 1.0);
        let later = Instant::now() + Duration::from_secs(10);
        let mut state = ClientState::new(bucket.capacity(), later);
        bucket.try_consume(&mut state, later);
        bucket.try_consume(&mut state, later);

        bucket.refill(&mut state, later - Duration::from_secs(5));
        assert_eq!(state.tokens(), 0.0);
    }

    #[test]
    fn test_tiny_refill_rate_saturates_retry_after() {
        let bucket = TokenBucket::new(1.0, 1e-300);
        let now = Instant::now();
        let mut state = ClientState::new(bucket.capacity(), now);
        assert!(bucket.try_consume(&mut state, now).is_admitted());

        assert_eq!(
            bucket.try_consume(&mut state, now),
            Admission::Rejected {
                retry_after: Duration::MAX
            }
        );
    }

    #[test]
    fn test_idle_for() {
        let start = Instant::now();
        let mut state = ClientState::new(1.0, start);
        assert_eq!(state.idle_for(start + Duration::from_secs(7)), Duration::from_secs(7));
        state.touch(start + Duration::from_secs(7));
        assert_eq!(state.idle_for(start + Duration::from_secs(7)), Duration::ZERO);
    }
}
