//! Admission counters
//!
//! Lightweight atomic counters updated on the request path. Relaxed
//! ordering is enough: the numbers are only read for reporting.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a controller
#[derive(Debug, Default)]
pub(crate) struct Counters {
    allowed: AtomicU64,
    denied: AtomicU64,
    created: AtomicU64,
    evicted: AtomicU64,
    sweeps: AtomicU64,
}

impl Counters {
    pub(crate) fn record_decision(&self, allowed: bool, created: bool) {
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }
        if created {
            self.created.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_sweep(&self, evicted: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active_keys: usize) -> AdmissionStats {
        AdmissionStats {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            active_keys,
        }
    }
}

/// Point-in-time copy of a controller's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    /// Requests admitted
    pub allowed: u64,
    /// Requests denied
    pub denied: u64,
    /// Entries created on first use of a key
    pub created: u64,
    /// Entries removed by the reaper
    pub evicted: u64,
    /// Completed reaper sweeps
    pub sweeps: u64,
    /// Entries currently held
    pub active_keys: usize,
}

impl AdmissionStats {
    /// Total decisions taken
    pub fn total(&self) -> u64 {
        self.allowed + self.denied
    }
}
