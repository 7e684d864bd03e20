//! Metrics registry
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; exactness across threads is not required

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the size report.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    scans_started: AtomicU64,
    scans_completed: AtomicU64,
    scans_failed: AtomicU64,
    scans_rejected: AtomicU64,
    records_visited: AtomicU64,
    entries_reported: AtomicU64,
    heartbeats_sent: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub scans_started: u64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub scans_rejected: u64,
    pub records_visited: u64,
    pub entries_reported: u64,
    pub heartbeats_sent: u64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_scans_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scans_completed(&self) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scans_failed(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A request refused before any scan began
    pub fn increment_scans_rejected(&self) {
        self.scans_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_visited(&self, count: u64) {
        self.records_visited.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_entries_reported(&self, count: u64) {
        self.entries_reported.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_heartbeats_sent(&self, count: u64) {
        self.heartbeats_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scans_started: self.scans_started.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            scans_rejected: self.scans_rejected.load(Ordering::Relaxed),
            records_visited: self.records_visited.load(Ordering::Relaxed),
            entries_reported: self.entries_reported.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }

    /// Counters as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}
