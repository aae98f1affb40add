use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

/// Counters owned by the generator loop. `sent` moves exactly once per
/// attempt, whether or not the dispatch succeeded.
#[derive(Debug, Default)]
pub struct GeneratorStats {
    sent: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GeneratorSnapshot {
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub target: String,
}

impl GeneratorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, succeeded: bool) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, target: &str) -> GeneratorSnapshot {
        GeneratorSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            target: target.to_string(),
        }
    }

    pub fn report(&self, target: &str) {
        info!(
            "generator has made {} requests to {} ({} ok, {} failed)",
            self.sent.load(Ordering::Relaxed),
            target,
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        );
    }
}

/// Counters shared by every collector arrival handler. Transport counters are
/// independent atomics; the per-originator table is last-write-wins.
#[derive(Debug, Default)]
pub struct CollectorStats {
    http: AtomicU64,
    datagram: AtomicU64,
    malformed: AtomicU64,
    per_originator: DashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CollectorSnapshot {
    pub http: u64,
    pub udp: u64,
    pub malformed: u64,
    pub per_originator: BTreeMap<String, u64>,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_http(&self) {
        self.http.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_datagram(&self) {
        self.datagram.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold an originator's self-reported counter into the table. Later
    /// arrivals overwrite earlier ones; ordering across originators is
    /// deliberately unspecified.
    pub fn fold_report(&self, originator: &str, counter: u64) {
        self.per_originator.insert(originator.to_string(), counter);
    }

    pub fn http_count(&self) -> u64 {
        self.http.load(Ordering::Relaxed)
    }

    pub fn datagram_count(&self) -> u64 {
        self.datagram.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        CollectorSnapshot {
            http: self.http.load(Ordering::Relaxed),
            udp: self.datagram.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            per_originator: self
                .per_originator
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }

    pub fn report(&self) {
        info!(
            "received {} HTTP arrivals, {} datagrams, {} originators reporting",
            self.http.load(Ordering::Relaxed),
            self.datagram.load(Ordering::Relaxed),
            self.per_originator.len(),
        );
    }
}
