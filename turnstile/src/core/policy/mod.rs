//! Limiter policies
//!
//! A policy is a pure algorithm: given its state and the current instant it
//! decides whether to admit and updates its state. Two are provided:
//!
//! - [`TokenBucket`]: burst of `capacity`, refilled continuously at `refill_rate`
//! - [`FixedWindow`]: at most `limit` admissions per non-overlapping `window`
//!
//! Both implement [`Limiter`]. The controller stores them as a
//! [`LimiterState`] so one map can hold either kind without boxing.

mod fixed_window;
mod token_bucket;


pub use fixed_window::FixedWindow;
pub use token_bucket::TokenBucket;

use super::AdmissionError;
use std::time::{Duration, Instant};

/// Admission algorithm operating on its own state
pub trait Limiter {
    /// Decide whether a request arriving at `now` is admitted
    ///
    /// Returns `true` and records the admission, or returns `false` and
    /// leaves the admission budget untouched.
    fn consume(&mut self, now: Instant) -> bool;

    /// Whole admissions still available without waiting
    fn remaining(&self) -> u64;
}

/// Policy parameters shared by every key of a controller
///
/// Build with [`Policy::token_bucket`] or [`Policy::fixed_window`], which
/// reject invalid parameters.
///
/// # Example
///
/// ```
/// use turnstile::Policy;
/// use std::time::Duration;
///
/// // Burst of 5, one token back every second
/// let bucket = Policy::token_bucket(5, 1.0).unwrap();
///
/// // 10 admissions per second
/// let window = Policy::fixed_window(10, Duration::from_secs(1)).unwrap();
///
/// assert!(Policy::fixed_window(10, Duration::ZERO).is_err());
/// # let _ = (bucket, window);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    /// Token bucket with `capacity` burst and `refill_rate` tokens per second
    TokenBucket { capacity: u64, refill_rate: f64 },
    /// Fixed window admitting `limit` requests per `window`
    FixedWindow { limit: u64, window: Duration },
}

impl Policy {
    /// Token bucket policy
    ///
    /// A `refill_rate` of zero is accepted: each key then gets a fixed quota
    /// of `capacity` admissions for the lifetime of its entry.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCapacity`] if `capacity` is zero
    /// - [`AdmissionError::InvalidRefillRate`] if `refill_rate` is negative or not finite
    pub fn token_bucket(capacity: u64, refill_rate: f64) -> Result<Self, AdmissionError> {
        let policy = Policy::TokenBucket {
            capacity,
            refill_rate,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Fixed window policy
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCapacity`] if `limit` is zero
    /// - [`AdmissionError::InvalidWindow`] if `window` is zero
    pub fn fixed_window(limit: u64, window: Duration) -> Result<Self, AdmissionError> {
        let policy = Policy::FixedWindow { limit, window };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the parameters
    ///
    /// The enum fields are public, so a policy built by hand is validated
    /// again when a controller is constructed from it.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        match *self {
            Policy::TokenBucket {
                capacity,
                refill_rate,
            } => {
                if capacity == 0 || capacity > TokenBucket::MAX_CAPACITY {
                    return Err(AdmissionError::InvalidCapacity);
                }
                if !refill_rate.is_finite() || refill_rate < 0.0 {
                    return Err(AdmissionError::InvalidRefillRate(refill_rate));
                }
            }
            Policy::FixedWindow { limit, window } => {
                if limit == 0 {
                    return Err(AdmissionError::InvalidCapacity);
                }
                if window.is_zero() {
                    return Err(AdmissionError::InvalidWindow);
                }
            }
        }
        Ok(())
    }

    /// Fresh state for a key first seen at `now`
    pub(crate) fn new_state(&self, now: Instant) -> LimiterState {
        match *self {
            Policy::TokenBucket {
                capacity,
                refill_rate,
            } => LimiterState::TokenBucket(TokenBucket::full(capacity, refill_rate, now)),
            Policy::FixedWindow { limit, window } => {
                LimiterState::FixedWindow(FixedWindow::starting(limit, window, now))
            }
        }
    }

    /// Short algorithm name, as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Policy::TokenBucket { .. } => "token-bucket",
            Policy::FixedWindow { .. } => "fixed-window",
        }
    }
}

/// Per-key limiter state
#[derive(Debug, Clone, PartialEq)]
pub enum LimiterState {
    TokenBucket(TokenBucket),
    FixedWindow(FixedWindow),
}

impl Limiter for LimiterState {
    fn consume(&mut self, now: Instant) -> bool {
        match self {
            LimiterState::TokenBucket(bucket) => bucket.consume(now),
            LimiterState::FixedWindow(window) => window.consume(now),
        }
    }

    fn remaining(&self) -> u64 {
        match self {
            LimiterState::TokenBucket(bucket) => bucket.remaining(),
            LimiterState::FixedWindow(window) => window.remaining(),
        }
    }
}
