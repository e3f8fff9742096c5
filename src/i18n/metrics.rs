//! Dispatch metrics and observability module.
//!
//! Counts translation requests, engine calls, failures and the characters
//! sent to the engine, which is what the provider bills by.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Global dispatch metrics singleton.
pub struct DispatchMetrics {
    /// Translation requests accepted by the dispatcher
    requests: AtomicUsize,

    /// Chunk calls issued to the engine
    api_calls: AtomicUsize,

    /// Chunk calls that failed
    api_failures: AtomicUsize,

    /// Characters submitted to the engine
    characters: AtomicUsize,
}

static METRICS: OnceLock<DispatchMetrics> = OnceLock::new();

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
            api_failures: AtomicUsize::new(0),
            characters: AtomicUsize::new(0),
        }
    }

    /// Process-wide counters shared by every dispatcher by default.
    pub fn global() -> &'static DispatchMetrics {
        METRICS.get_or_init(DispatchMetrics::new)
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one chunk call carrying `characters` characters.
    pub fn record_api_call(&self, characters: usize) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.characters.fetch_add(characters, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn characters(&self) -> usize {
        self.characters.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsReport {
        let calls = self.api_calls();
        let failures = self.api_failures();
        let api_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            requests: self.requests(),
            api_calls: calls,
            api_failures: failures,
            api_success_rate,
            characters: self.characters(),
        }
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub requests: usize,
    pub api_calls: usize,
    pub api_failures: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,

    pub characters: usize,
}
