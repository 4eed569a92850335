use super::Limiter;
use crate::core::AdmissionError;
use std::time::{Duration, Instant};

/// Fixed window counter for one key
///
/// Counts admissions since `window_start`. Once `window` has elapsed the next
/// call opens a new window at its own arrival time and the count restarts.
///
/// Up to `2 * limit` requests can be admitted within any interval of length
/// `window` that straddles a boundary: `limit` at the end of one window and
/// `limit` at the start of the next. This is inherent to fixed windows and is
/// not corrected here.
///
/// # Example
///
/// ```
/// use turnstile::{FixedWindow, Limiter};
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut window = FixedWindow::new(1, Duration::from_secs(1), start).unwrap();
///
/// assert!(window.consume(start));
/// assert!(!window.consume(start + Duration::from_millis(500)));
/// assert!(window.consume(start + Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FixedWindow {
    limit: u64,
    window: Duration,
    count: u64,
    window_start: Instant,
}

impl FixedWindow {
    /// Create a window opening at `now`
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::InvalidCapacity`] if `limit` is zero
    /// - [`AdmissionError::InvalidWindow`] if `window` is zero
    pub fn new(limit: u64, window: Duration, now: Instant) -> Result<Self, AdmissionError> {
        if limit == 0 {
            return Err(AdmissionError::InvalidCapacity);
        }
        if window.is_zero() {
            return Err(AdmissionError::InvalidWindow);
        }
        Ok(Self::starting(limit, window, now))
    }

    pub(crate) fn starting(limit: u64, window: Duration, now: Instant) -> Self {
        FixedWindow {
            limit,
            window,
            count: 0,
            window_start: now,
        }
    }

    /// Admissions allowed per window
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admissions counted in the current window
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Start of the current window
    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

impl Limiter for FixedWindow {
    fn consume(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> u64 {
        self.limit - self.count
    }
}
