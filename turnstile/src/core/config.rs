//! Declarative controller configuration
//!
//! [`AdmissionConfig`] is the flat, deserializable form of a controller's
//! settings. One numeric pair carries the parameters of either algorithm:
//!
//! | algorithm      | `capacity_or_limit` | `refill_rate_per_sec_or_window_seconds` |
//! |----------------|---------------------|-----------------------------------------|
//! | `token-bucket` | bucket capacity     | tokens added per second                 |
//! | `fixed-window` | admissions/window   | window length in seconds                |

use super::AdmissionError;
use super::policy::Policy;
use super::store::KeyStore;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CAPACITY_OR_LIMIT: u64 = 10;
const DEFAULT_RATE_OR_WINDOW: f64 = 10.0;
const DEFAULT_REAPER_PERIOD_SECS: u64 = 30;
const DEFAULT_ENTRY_TTL_SECS: u64 = 10;
const DEFAULT_STORE_CAPACITY: usize = 1000;

/// Limiting algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Per-key token bucket with continuous refill
    TokenBucket,
    /// Counter reset at fixed intervals
    FixedWindow,
}

impl std::str::FromStr for Algorithm {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "token-bucket" => Ok(Algorithm::TokenBucket),
            "fixed-window" => Ok(Algorithm::FixedWindow),
            _ => Err(AdmissionError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Whether limiter state is kept per client key or shared by all of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScope {
    /// Each key has its own entry
    #[default]
    PerKey,
    /// Every call shares one entry whatever its key
    Global,
}

impl std::str::FromStr for KeyScope {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-key" => Ok(KeyScope::PerKey),
            "global" => Ok(KeyScope::Global),
            _ => Err(AdmissionError::UnknownScope(s.to_string())),
        }
    }
}

/// Flat controller settings
///
/// Every field except `algorithm` has a default, so a minimal document only
/// needs to name the algorithm.
///
/// # Example
///
/// ```
/// use turnstile::{AdmissionConfig, Algorithm};
///
/// let config: AdmissionConfig = serde_json::from_str(
///     r#"{ "algorithm": "fixed-window", "capacity_or_limit": 10,
///          "refill_rate_per_sec_or_window_seconds": 1 }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.algorithm, Algorithm::FixedWindow);
/// assert!(config.policy().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdmissionConfig {
    pub algorithm: Algorithm,
    #[serde(default = "default_capacity_or_limit")]
    pub capacity_or_limit: u64,
    #[serde(default = "default_rate_or_window")]
    pub refill_rate_per_sec_or_window_seconds: f64,
    /// Seconds between reaper sweeps
    #[serde(default = "default_reaper_period_secs")]
    pub reaper_period_secs: u64,
    /// Seconds of inactivity after which a key is evicted
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,
    #[serde(default)]
    pub scope: KeyScope,
    /// Initial number of keys the store is sized for
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
}

fn default_capacity_or_limit() -> u64 {
    DEFAULT_CAPACITY_OR_LIMIT
}

fn default_rate_or_window() -> f64 {
    DEFAULT_RATE_OR_WINDOW
}

fn default_reaper_period_secs() -> u64 {
    DEFAULT_REAPER_PERIOD_SECS
}

fn default_entry_ttl_secs() -> u64 {
    DEFAULT_ENTRY_TTL_SECS
}

fn default_store_capacity() -> usize {
    DEFAULT_STORE_CAPACITY
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            algorithm: Algorithm::TokenBucket,
            capacity_or_limit: DEFAULT_CAPACITY_OR_LIMIT,
            refill_rate_per_sec_or_window_seconds: DEFAULT_RATE_OR_WINDOW,
            reaper_period_secs: DEFAULT_REAPER_PERIOD_SECS,
            entry_ttl_secs: DEFAULT_ENTRY_TTL_SECS,
            scope: KeyScope::PerKey,
            store_capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

impl AdmissionConfig {
    /// Policy described by the algorithm and its numeric pair
    ///
    /// # Errors
    ///
    /// Returns the policy's validation error, or
    /// [`AdmissionError::InvalidWindow`] if the window seconds cannot be
    /// represented as a duration.
    pub fn policy(&self) -> Result<Policy, AdmissionError> {
        match self.algorithm {
            Algorithm::TokenBucket => Policy::token_bucket(
                self.capacity_or_limit,
                self.refill_rate_per_sec_or_window_seconds,
            ),
            Algorithm::FixedWindow => {
                let window = Duration::try_from_secs_f64(self.refill_rate_per_sec_or_window_seconds)
                    .map_err(|_| AdmissionError::InvalidWindow)?;
                Policy::fixed_window(self.capacity_or_limit, window)
            }
        }
    }

    pub fn reaper_period(&self) -> Duration {
        Duration::from_secs(self.reaper_period_secs)
    }

    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs)
    }

    /// Check every setting without building anything
    pub fn validate(&self) -> Result<(), AdmissionError> {
        self.policy()?;
        if self.reaper_period_secs == 0 {
            return Err(AdmissionError::InvalidReaperPeriod);
        }
        if self.entry_ttl_secs == 0 {
            return Err(AdmissionError::InvalidTtl);
        }
        if self.store_capacity > KeyStore::MAX_CAPACITY {
            return Err(AdmissionError::InvalidStoreCapacity(self.store_capacity));
        }
        Ok(())
    }
}
