//! Hub Statistics
//!
//! Monotonic counters updated by the dispatcher and read by anyone.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct HubStats {
    registered: AtomicU64,
    replaced: AtomicU64,
    rejected: AtomicU64,
    unregistered: AtomicU64,
    stale_unregisters: AtomicU64,
    fanout_requests: AtomicU64,
    delivered: AtomicU64,
    skipped_offline: AtomicU64,
    dropped: AtomicU64,
    evicted: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub replaced: u64,
    pub rejected: u64,
    pub unregistered: u64,
    pub stale_unregisters: u64,
    pub fanout_requests: u64,
    pub delivered: u64,
    pub skipped_offline: u64,
    pub dropped: u64,
    pub evicted: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl HubStats {
    pub fn record_registered(&self) {
        bump(&self.registered);
    }

    pub fn record_replaced(&self) {
        bump(&self.replaced);
    }

    pub fn record_rejected(&self) {
        bump(&self.rejected);
    }

    pub fn record_unregistered(&self) {
        bump(&self.unregistered);
    }

    pub fn record_stale_unregister(&self) {
        bump(&self.stale_unregisters);
    }

    pub fn record_fanout(&self) {
        bump(&self.fanout_requests);
    }

    pub fn record_delivered(&self) {
        bump(&self.delivered);
    }

    pub fn record_skipped_offline(&self) {
        bump(&self.skipped_offline);
    }

    pub fn record_dropped(&self) {
        bump(&self.dropped);
    }

    pub fn record_evicted(&self) {
        bump(&self.evicted);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        StatsSnapshot {
            registered: load(&self.registered),
            replaced: load(&self.replaced),
            rejected: load(&self.rejected),
            unregistered: load(&self.unregistered),
            stale_unregisters: load(&self.stale_unregisters),
            fanout_requests: load(&self.fanout_requests),
            delivered: load(&self.delivered),
            skipped_offline: load(&self.skipped_offline),
            dropped: load(&self.dropped),
            evicted: load(&self.evicted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = HubStats::default();
        stats.record_registered();
        stats.record_delivered();
        stats.record_delivered();
        stats.record_evicted();

        let snap = stats.snapshot();
        assert_eq!(snap.registered, 1);
        assert_eq!(snap.delivered, 2);
        assert_eq!(snap.evicted, 1);
        assert_eq!(snap.dropped, 0);
    }
}
