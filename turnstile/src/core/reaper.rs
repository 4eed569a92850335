//! Background eviction of idle keys
//!
//! Without eviction every client ever seen would keep an entry forever. The
//! reaper wakes up every `reaper_period`, takes a snapshot of the store and
//! removes each key that has been idle for longer than `entry_ttl`.
//!
//! The snapshot is taken under the store lock but the sweep is not: each
//! removal takes the lock again and re-checks the idle time, so a key used
//! while the sweep runs is kept with its state, and a key removed just
//! before a request is simply created fresh by that request.

use super::controller::Shared;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries in the snapshot
    pub scanned: usize,
    /// Entries removed
    pub evicted: usize,
    /// Entries left in the store afterwards
    pub remaining: usize,
}

/// Run one sweep over the store
pub(crate) fn sweep(shared: &Shared) -> SweepReport {
    let now = shared.clock.now();
    let ttl = shared.entry_ttl;
    let snapshot = shared.store.snapshot();
    let scanned = snapshot.len();
    let mut evicted = 0;

    for entry in snapshot {
        let idle = now.saturating_duration_since(entry.last_used);
        if idle > ttl && shared.store.remove_if_idle(&entry.key, ttl, now) {
            tracing::debug!(key = %entry.key, idle = ?idle, "Evicted idle entry");
            evicted += 1;
        }
    }

    shared.counters.record_sweep(evicted);
    let remaining = shared.store.len();
    tracing::debug!(scanned, evicted, remaining, "Reaper sweep finished");

    SweepReport {
        scanned,
        evicted,
        remaining,
    }
}

/// Running reaper task
///
/// Dropping the handle cancels the task; [`shutdown`](Self::shutdown) also
/// waits for it to finish.
pub(crate) struct ReaperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    pub(crate) fn spawn(shared: Arc<Shared>, period: Duration, runtime: &Handle) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::info!(
                period = ?period,
                ttl = ?shared.entry_ttl,
                "Reaper started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        sweep(&shared);
                    }
                }
            }

            tracing::info!("Reaper shutting down");
        });

        ReaperHandle {
            cancel,
            task: Some(task),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            // A panicked sweep has nothing left to clean up
            if let Err(e) = task.await {
                tracing::error!("Reaper task failed: {}", e);
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
