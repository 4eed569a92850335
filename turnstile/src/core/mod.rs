//! Core components of the turnstile admission controller
//!
//! This module contains the building blocks, leaf first:
//! - [`clock`]: Monotonic time sources
//! - [`policy`]: The token bucket and fixed window algorithms
//! - [`store`]: The concurrent per-key state map
//! - [`reaper`]: Background eviction of idle keys
//! - [`controller`]: The [`AdmissionController`] façade
//! - [`config`]: Declarative controller configuration
//! - [`stats`]: Admission counters

pub mod clock;
pub mod config;
pub mod controller;
pub mod policy;
pub mod reaper;
pub mod stats;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdmissionConfig, Algorithm, KeyScope};
pub use controller::{AdmissionController, AdmissionControllerBuilder};
pub use policy::{FixedWindow, Limiter, LimiterState, Policy, TokenBucket};
pub use reaper::SweepReport;
pub use stats::AdmissionStats;
pub use store::{EntrySnapshot, KeyEntry, KeyStore};

use std::error::Error;
use std::fmt;

/// Errors that can occur while constructing an admission controller
///
/// Every variant is a configuration problem detected at construction time.
/// [`AdmissionController::allow`] never fails: a denial is the `false`
/// return value, not an error.
///
/// # Example
///
/// ```
/// use turnstile::{AdmissionError, Policy};
///
/// match Policy::token_bucket(0, 1.0) {
///     Err(AdmissionError::InvalidCapacity) => println!("capacity must be at least 1"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionError {
    /// Token bucket capacity or fixed window limit was zero, or the
    /// capacity was too large to count in single tokens
    InvalidCapacity,
    /// Refill rate was negative, NaN or infinite
    InvalidRefillRate(f64),
    /// Fixed window length was zero, negative or not finite
    InvalidWindow,
    /// Reaper period was zero
    InvalidReaperPeriod,
    /// Entry TTL was zero
    InvalidTtl,
    /// Initial store capacity was above [`KeyStore::MAX_CAPACITY`]
    InvalidStoreCapacity(usize),
    /// Algorithm name was not recognised
    UnknownAlgorithm(String),
    /// Key scope name was not recognised
    UnknownScope(String),
    /// The reaper was requested outside of a tokio runtime
    NoRuntime,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::InvalidCapacity => {
                write!(f, "capacity must be at least 1 and at most 2^53")
            }
            AdmissionError::InvalidStoreCapacity(capacity) => write!(
                f,
                "store capacity must be at most {}, got {capacity}",
                KeyStore::MAX_CAPACITY
            ),
            AdmissionError::InvalidRefillRate(rate) => {
                write!(f, "refill rate must be a finite non-negative number, got {rate}")
            }
            AdmissionError::InvalidWindow => write!(f, "window must be a positive duration"),
            AdmissionError::InvalidReaperPeriod => {
                write!(f, "reaper period must be a positive duration")
            }
            AdmissionError::InvalidTtl => write!(f, "entry ttl must be a positive duration"),
            AdmissionError::UnknownAlgorithm(name) => write!(
                f,
                "unknown algorithm: {name}. Valid options are: token-bucket, fixed-window"
            ),
            AdmissionError::UnknownScope(name) => {
                write!(f, "unknown key scope: {name}. Valid options are: per-key, global")
            }
            AdmissionError::NoRuntime => {
                write!(f, "the reaper must be started from within a tokio runtime")
            }
        }
    }
}

impl Error for AdmissionError {}
