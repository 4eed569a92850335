//! The admission controller façade
//!
//! [`AdmissionController`] ties together the key store, the policy shared
//! by all keys, the clock and the reaper. Callers only need
//! [`allow`](AdmissionController::allow).

use super::AdmissionError;
use super::clock::{Clock, SystemClock};
use super::config::{AdmissionConfig, KeyScope};
use super::policy::{Limiter, Policy};
use super::reaper::{self, ReaperHandle, SweepReport};
use super::stats::{AdmissionStats, Counters};
use super::store::KeyStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const DEFAULT_REAPER_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(10);
const DEFAULT_CAPACITY: usize = 1000;

/// Store key used for every call when the scope is [`KeyScope::Global`]
const GLOBAL_KEY: &str = "*";

/// State shared by the controller handles and the reaper task
pub(crate) struct Shared {
    pub(crate) store: KeyStore,
    pub(crate) policy: Policy,
    pub(crate) scope: KeyScope,
    pub(crate) entry_ttl: Duration,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) counters: Counters,
}

struct Inner {
    shared: Arc<Shared>,
    reaper_period: Duration,
    // Dropped with the last controller handle, which cancels the task
    reaper: Mutex<Option<ReaperHandle>>,
}

/// Request admission controller
///
/// Cloning is cheap and every clone shares the same state. When the last
/// clone is dropped the background reaper, if any, is cancelled.
///
/// # Example
///
/// ```
/// use turnstile::{AdmissionController, Policy};
///
/// // Burst of 2 per client, no refill
/// let controller = AdmissionController::builder(Policy::token_bucket(2, 0.0).unwrap())
///     .build()
///     .unwrap();
///
/// assert!(controller.allow("192.0.2.1"));
/// assert!(controller.allow("192.0.2.1"));
/// assert!(!controller.allow("192.0.2.1"));
///
/// // Other clients are unaffected
/// assert!(controller.allow("192.0.2.2"));
/// ```
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    /// Start configuring a controller around `policy`
    pub fn builder(policy: Policy) -> AdmissionControllerBuilder {
        AdmissionControllerBuilder::new(policy)
    }

    /// Build a controller from flat settings and start its reaper
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Any validation error of `config`, or [`AdmissionError::NoRuntime`].
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, AdmissionError> {
        AdmissionControllerBuilder::from_config(config)?.start()
    }

    /// Decide whether a request from `key` is admitted
    ///
    /// Never fails and never waits for anything but the store lock. With
    /// [`KeyScope::Global`] the key is ignored and all callers share one
    /// limiter.
    pub fn allow(&self, key: &str) -> bool {
        let shared = &self.inner.shared;
        let key = match shared.scope {
            KeyScope::PerKey => key,
            KeyScope::Global => GLOBAL_KEY,
        };
        let now = shared.clock.now();

        let ((allowed, remaining), created) = shared.store.get_or_create(
            key,
            now,
            || shared.policy.new_state(now),
            |entry| {
                let allowed = entry.state.consume(now);
                (allowed, entry.state.remaining())
            },
        );

        shared.counters.record_decision(allowed, created);
        if allowed {
            tracing::trace!(key, remaining, created, "Request admitted");
        } else {
            tracing::trace!(key, remaining, "Request denied");
        }

        allowed
    }

    /// Run one reaper sweep now
    ///
    /// Useful when the controller was built without a background reaper.
    pub fn sweep(&self) -> SweepReport {
        reaper::sweep(&self.inner.shared)
    }

    /// Current counters
    pub fn stats(&self) -> AdmissionStats {
        let shared = &self.inner.shared;
        shared.counters.snapshot(shared.store.len())
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.inner.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.shared.store.is_empty()
    }

    /// Whether `key` currently has an entry
    ///
    /// With [`KeyScope::Global`] this reports on the shared entry.
    pub fn is_tracked(&self, key: &str) -> bool {
        let shared = &self.inner.shared;
        match shared.scope {
            KeyScope::PerKey => shared.store.contains(key),
            KeyScope::Global => shared.store.contains(GLOBAL_KEY),
        }
    }

    pub fn policy(&self) -> Policy {
        self.inner.shared.policy
    }

    pub fn scope(&self) -> KeyScope {
        self.inner.shared.scope
    }

    pub fn entry_ttl(&self) -> Duration {
        self.inner.shared.entry_ttl
    }

    pub fn reaper_period(&self) -> Duration {
        self.inner.reaper_period
    }

    /// Whether a background reaper is running
    pub fn is_reaping(&self) -> bool {
        self.inner
            .reaper
            .lock()
            .as_ref()
            .is_some_and(|reaper| !reaper.is_finished())
    }

    /// Stop the background reaper and wait for it to exit
    ///
    /// Admission keeps working afterwards; idle keys are then only removed
    /// by explicit [`sweep`](Self::sweep) calls.
    pub async fn shutdown(&self) {
        let reaper = self.inner.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.shutdown().await;
        }
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = &self.inner.shared;
        f.debug_struct("AdmissionController")
            .field("policy", &shared.policy)
            .field("scope", &shared.scope)
            .field("entry_ttl", &shared.entry_ttl)
            .field("reaper_period", &self.inner.reaper_period)
            .field("keys", &shared.store.len())
            .finish()
    }
}

/// Builder for an [`AdmissionController`]
///
/// # Example
///
/// ```
/// use turnstile::{AdmissionController, KeyScope, Policy};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), turnstile::AdmissionError> {
/// let controller = AdmissionController::builder(Policy::fixed_window(10, Duration::from_secs(1))?)
///     .scope(KeyScope::Global)
///     .reaper_period(Duration::from_secs(30))
///     .entry_ttl(Duration::from_secs(10))
///     .start()?;
///
/// assert!(controller.allow("any"));
/// controller.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct AdmissionControllerBuilder {
    policy: Policy,
    scope: KeyScope,
    reaper_period: Duration,
    entry_ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl AdmissionControllerBuilder {
    /// Create a builder with default settings
    pub fn new(policy: Policy) -> Self {
        AdmissionControllerBuilder {
            policy,
            scope: KeyScope::PerKey,
            reaper_period: DEFAULT_REAPER_PERIOD,
            entry_ttl: DEFAULT_ENTRY_TTL,
            capacity: DEFAULT_CAPACITY,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder preloaded from flat settings
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, AdmissionError> {
        config.validate()?;
        Ok(Self::new(config.policy()?)
            .scope(config.scope)
            .reaper_period(config.reaper_period())
            .entry_ttl(config.entry_ttl())
            .capacity(config.store_capacity))
    }

    /// Per-key or global limiting
    pub fn scope(mut self, scope: KeyScope) -> Self {
        self.scope = scope;
        self
    }

    /// Interval between reaper sweeps
    pub fn reaper_period(mut self, period: Duration) -> Self {
        self.reaper_period = period;
        self
    }

    /// Idle time after which a key is evicted
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Expected number of distinct keys
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Time source, [`SystemClock`] by default
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn validate(&self) -> Result<(), AdmissionError> {
        self.policy.validate()?;
        if self.reaper_period.is_zero() {
            return Err(AdmissionError::InvalidReaperPeriod);
        }
        if self.entry_ttl.is_zero() {
            return Err(AdmissionError::InvalidTtl);
        }
        if self.capacity > KeyStore::MAX_CAPACITY {
            return Err(AdmissionError::InvalidStoreCapacity(self.capacity));
        }
        Ok(())
    }

    /// Build a controller without a background reaper
    ///
    /// Idle keys are only removed by calling
    /// [`sweep`](AdmissionController::sweep).
    pub fn build(self) -> Result<AdmissionController, AdmissionError> {
        self.validate()?;

        let shared = Arc::new(Shared {
            store: KeyStore::with_capacity(self.capacity),
            policy: self.policy,
            scope: self.scope,
            entry_ttl: self.entry_ttl,
            clock: self.clock,
            counters: Counters::default(),
        });

        Ok(AdmissionController {
            inner: Arc::new(Inner {
                shared,
                reaper_period: self.reaper_period,
                reaper: Mutex::new(None),
            }),
        })
    }

    /// Build a controller and spawn its reaper on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Any validation error, or [`AdmissionError::NoRuntime`] when called
    /// outside a tokio runtime.
    pub fn start(self) -> Result<AdmissionController, AdmissionError> {
        let controller = self.build()?;
        let runtime = Handle::try_current().map_err(|_| AdmissionError::NoRuntime)?;

        let reaper = ReaperHandle::spawn(
            Arc::clone(&controller.inner.shared),
            controller.inner.reaper_period,
            &runtime,
        );
        *controller.inner.reaper.lock() = Some(reaper);

        tracing::info!(
            policy = controller.policy().name(),
            scope = ?controller.scope(),
            "Admission controller started"
        );

        Ok(controller)
    }
}
