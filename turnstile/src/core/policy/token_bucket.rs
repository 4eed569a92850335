use super::Limiter;
use crate::core::AdmissionError;
use std::time::Instant;

/// Token bucket state for one key
///
/// The bucket starts full. Tokens flow back continuously at `refill_rate`
/// per second up to `capacity`; every admission takes exactly one. Fractional
/// tokens are kept, so a slow rate still adds up to an admission eventually.
///
/// # Example
///
/// ```
/// use turnstile::{Limiter, TokenBucket};
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut bucket = TokenBucket::new(2, 1.0, start).unwrap();
///
/// assert!(bucket.consume(start));
/// assert!(bucket.consume(start));
/// assert!(!bucket.consume(start));
///
/// // One second later one token is back
/// assert!(bucket.consume(start + Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    capacity: u64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Largest capacity whose token count still drops by exactly one per admission
    pub const MAX_CAPACITY: u64 = 1 << 53;

    /// Create a full bucket
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCapacity`] if `capacity` is zero or above
    ///   [`MAX_CAPACITY`](Self::MAX_CAPACITY)
    /// - [`AdmissionError::InvalidRefillRate`] if `refill_rate` is negative or not finite
    pub fn new(capacity: u64, refill_rate: f64, now: Instant) -> Result<Self, AdmissionError> {
        if capacity == 0 || capacity > Self::MAX_CAPACITY {
            return Err(AdmissionError::InvalidCapacity);
        }
        if !refill_rate.is_finite() || refill_rate < 0.0 {
            return Err(AdmissionError::InvalidRefillRate(refill_rate));
        }
        Ok(Self::full(capacity, refill_rate, now))
    }

    pub(crate) fn full(capacity: u64, refill_rate: f64, now: Instant) -> Self {
        TokenBucket {
            capacity,
            refill_rate,
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Maximum burst
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens added per second
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Current token level, fractional part included
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        // A clock reading older than the last refill adds nothing
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

impl Limiter for TokenBucket {
    fn consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> u64 {
        self.tokens.floor() as u64
    }
}
