//! Counters exposed to an external monitor: headers committed, peers dropped, and cycle restarts
//! by kind.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct SkeletonCounters {
    pub headers_committed: AtomicU64,
    pub peers_dropped: AtomicU64,
    pub cycles_merged: AtomicU64,
    pub cycles_reorged: AtomicU64,
    pub cycles_linked: AtomicU64,
    pub requests_timed_out: AtomicU64,
}

impl SkeletonCounters {
    pub fn snapshot(&self) -> SkeletonCountersSnapshot {
        SkeletonCountersSnapshot {
            headers_committed: self.headers_committed.load(Ordering::Relaxed),
            peers_dropped: self.peers_dropped.load(Ordering::Relaxed),
            cycles_merged: self.cycles_merged.load(Ordering::Relaxed),
            cycles_reorged: self.cycles_reorged.load(Ordering::Relaxed),
            cycles_linked: self.cycles_linked.load(Ordering::Relaxed),
            requests_timed_out: self.requests_timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkeletonCountersSnapshot {
    pub headers_committed: u64,
    pub peers_dropped: u64,
    pub cycles_merged: u64,
    pub cycles_reorged: u64,
    pub cycles_linked: u64,
    pub requests_timed_out: u64,
}
