//! Performance Counters
//!
//! Monotonic load telemetry kept in a single signal, so a stats panel can
//! subscribe once and see all three numbers change together.

use crate::signals::{Cleanup, Signal, signal};

/// Snapshot of the loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceStats {
    /// Items that entered the viewport without a cached payload. Items
    /// sharing one request each count; retries do not.
    pub total_requested: u64,
    /// Pending items that left the viewport (or were dropped by shutdown).
    pub canceled: u64,
    /// Items whose payload arrived.
    pub fully_loaded: u64,
}

impl PerformanceStats {
    /// Items that neither loaded nor were canceled. Includes failures.
    pub fn unsettled(&self) -> u64 {
        self.total_requested
            .saturating_sub(self.canceled)
            .saturating_sub(self.fully_loaded)
    }
}

/// Reactive holder of [`PerformanceStats`].
#[derive(Clone)]
pub struct PerformanceCounters {
    stats: Signal<PerformanceStats>,
}

impl Default for PerformanceCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceCounters {
    pub fn new() -> Self {
        Self {
            stats: signal(PerformanceStats::default()),
        }
    }

    pub fn record_requested(&self) {
        self.stats.update(|s| PerformanceStats {
            total_requested: s.total_requested + 1,
            ..*s
        });
    }

    pub fn record_canceled(&self) {
        self.stats.update(|s| PerformanceStats {
            canceled: s.canceled + 1,
            ..*s
        });
    }

    pub fn record_loaded(&self) {
        self.stats.update(|s| PerformanceStats {
            fully_loaded: s.fully_loaded + 1,
            ..*s
        });
    }

    pub fn snapshot(&self) -> PerformanceStats {
        self.stats.get()
    }

    /// Underlying signal, for use inside derived computations.
    pub fn signal(&self) -> Signal<PerformanceStats> {
        self.stats.clone()
    }

    pub fn subscribe(&self, f: impl Fn(&PerformanceStats) + 'static) -> Cleanup {
        self.stats.subscribe(f)
    }
}
