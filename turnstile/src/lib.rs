//! # Turnstile
//!
//! An in-memory request admission controller: decides, per client key,
//! whether an incoming request may proceed.
//!
//! ## Overview
//!
//! Turnstile bounds the rate of admitted requests per key with one of two
//! policies, chosen once for the whole controller:
//!
//! - **Token bucket**: each key holds up to `capacity` tokens, refilled
//!   continuously at `refill_rate` per second. A new key starts with a full
//!   bucket, so short bursts are admitted.
//! - **Fixed window**: each key may be admitted `limit` times per `window`;
//!   the counter restarts when a call arrives after the window has elapsed.
//!
//! Keys are created lazily on first use and evicted by a background reaper
//! once idle for longer than a TTL, so abandoned clients do not leak memory.
//!
//! ## Quick Start
//!
//! ```
//! use turnstile::{AdmissionController, Policy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), turnstile::AdmissionError> {
//! // Burst of 5 per client IP, one request per second sustained
//! let controller = AdmissionController::builder(Policy::token_bucket(5, 1.0)?).start()?;
//!
//! if controller.allow("203.0.113.7") {
//!     println!("Request admitted");
//! } else {
//!     println!("Too many requests");
//! }
//! # controller.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```
//! use turnstile::{AdmissionController, AdmissionConfig, Algorithm, KeyScope};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), turnstile::AdmissionError> {
//! let config = AdmissionConfig {
//!     algorithm: Algorithm::FixedWindow,
//!     capacity_or_limit: 10,
//!     refill_rate_per_sec_or_window_seconds: 1.0,
//!     scope: KeyScope::Global,
//!     ..AdmissionConfig::default()
//! };
//! let controller = AdmissionController::from_config(&config)?;
//! # controller.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! Invalid parameters (zero capacity, zero window, zero reaper period or
//! TTL) fail construction with an [`AdmissionError`]. After construction
//! nothing can fail: [`AdmissionController::allow`] only ever returns a
//! boolean.
//!
//! ## Key Scope
//!
//! With [`KeyScope::PerKey`] (the default) every key is limited on its own.
//! With [`KeyScope::Global`] all callers share a single limiter and the key
//! is ignored.
//!
//! ## Testing
//!
//! Pass a [`ManualClock`] to the builder to control time in tests, and call
//! [`AdmissionController::sweep`] to run the reaper synchronously.
//!
//! ```
//! use turnstile::{AdmissionController, ManualClock, Policy};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let controller = AdmissionController::builder(Policy::token_bucket(1, 1.0).unwrap())
//!     .entry_ttl(Duration::from_secs(10))
//!     .clock(clock.clone())
//!     .build()
//!     .unwrap();
//!
//! assert!(controller.allow("client"));
//! assert!(!controller.allow("client"));
//!
//! clock.advance(Duration::from_secs(1));
//! assert!(controller.allow("client"));
//!
//! clock.advance(Duration::from_secs(11));
//! assert_eq!(controller.sweep().evicted, 1);
//! assert!(!controller.is_tracked("client"));
//! ```
//!
//! ## Thread Safety
//!
//! The controller is `Send + Sync` and cheap to clone. Calls for the same
//! key are serialized by the store lock; the lock is held only for a map
//! lookup and a few arithmetic operations.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing

pub mod core;

pub use core::{
    AdmissionConfig, AdmissionController, AdmissionControllerBuilder, AdmissionError,
    AdmissionStats, Algorithm, Clock, EntrySnapshot, FixedWindow, KeyEntry, KeyScope, KeyStore,
    Limiter, LimiterState, ManualClock, Policy, SweepReport, SystemClock, TokenBucket,
};
