//! Process-wide counters and the read-only metrics snapshot.
//!
//! [`ProxyStats`] holds the aggregate request counter and process start
//! time; [`snapshot`] combines it with per-backend state into a
//! serializable point-in-time view. No history is retained.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::backend::BackendPool;

/// Aggregate counters shared by the forwarding path and the metrics
/// endpoint. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct ProxyStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug)]
struct StatsInner {
    /// Total requests dispatched to any backend since process start.
    total_requests: AtomicU64,
    /// Set once at construction; read-only afterwards.
    started_at: Instant,
}

impl ProxyStats {
    /// Creates a fresh counter set with the start time set to now.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                total_requests: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    /// Counts one dispatched request.
    pub fn record_request(&self) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of dispatched requests.
    pub fn total_requests(&self) -> u64 {
        self.inner.total_requests.load(Ordering::Relaxed)
    }

    /// Returns the elapsed time since construction, in seconds.
    pub fn uptime_seconds(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64()
    }
}

impl Default for ProxyStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time view of the balancer's operational state.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    /// Total requests dispatched since process start.
    pub total_requests: u64,
    /// Seconds elapsed since process start.
    pub uptime_seconds: f64,
    /// Per-backend statistics, in registry order.
    pub servers: Vec<BackendSnapshot>,
}

/// Statistics for a single backend within a [`MetricsSnapshot`].
#[derive(Debug, Serialize)]
pub struct BackendSnapshot {
    /// The backend's display name.
    pub name: String,
    /// The backend address. Serialized as `url`, which is what the
    /// dashboard consumes.
    #[serde(rename = "url")]
    pub address: String,
    /// Requests routed to this backend since process start.
    pub requests: u64,
    /// Whether the backend is currently considered healthy.
    pub healthy: bool,
}

/// Produces a snapshot of the current pool and aggregate state.
///
/// Pure read; mutates nothing.
pub fn snapshot(pool: &BackendPool, stats: &ProxyStats) -> MetricsSnapshot {
    let servers = pool
        .all()
        .iter()
        .map(|backend| BackendSnapshot {
            name: backend.name().to_string(),
            address: backend.uri().to_string(),
            requests: backend.request_count(),
            healthy: backend.is_healthy(),
        })
        .collect();

    MetricsSnapshot {
        total_requests: stats.total_requests(),
        uptime_seconds: stats.uptime_seconds(),
        servers,
    }
}
