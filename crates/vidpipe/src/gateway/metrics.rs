//! Per-operation call statistics for the vendor client.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    calls: u64,
    errors: u64,
    cache_hits: u64,
    total_latency: Duration,
}

/// Snapshot of one operation's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub calls: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub total_latency_ms: u64,
    pub avg_latency_ms: u64,
}

#[derive(Debug, Default)]
pub struct GatewayMetrics {
    counters: Mutex<HashMap<&'static str, Counters>>,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, operation: &'static str, f: impl FnOnce(&mut Counters)) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        f(counters.entry(operation).or_default());
    }

    /// Records a completed network call (cache hits are not calls).
    pub fn record_call(&self, operation: &'static str, latency: Duration, ok: bool) {
        self.update(operation, |c| {
            c.calls += 1;
            c.total_latency += latency;
            if !ok {
                c.errors += 1;
            }
        });
    }

    pub fn record_cache_hit(&self, operation: &'static str) {
        self.update(operation, |c| c.cache_hits += 1);
    }

    /// Current counters, keyed by operation name.
    pub fn snapshot(&self) -> BTreeMap<String, OperationStats> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .map(|(op, c)| {
                let total_ms = c.total_latency.as_millis() as u64;
                let avg = if c.calls > 0 { total_ms / c.calls } else { 0 };
                (
                    op.to_string(),
                    OperationStats {
                        calls: c.calls,
                        errors: c.errors,
                        cache_hits: c.cache_hits,
                        total_latency_ms: total_ms,
                        avg_latency_ms: avg,
                    },
                )
            })
            .collect()
    }
}
