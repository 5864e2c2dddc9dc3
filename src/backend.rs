//! Per-backend state and the fixed backend registry.
//!
//! Each backend is represented by a [`Backend`] holding its validated URI,
//! display name, and two atomic fields: a request counter written by the
//! forwarding path and a health flag written by the health checker. Both
//! are read concurrently without external locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::ValidatedBackend;

/// The fixed, ordered set of backends shared by the selector, health
/// checker, and metrics snapshot.
///
/// Constructed once at startup; never resized or reordered, so the backend
/// at position `i` keeps its identity for the process lifetime.
#[derive(Debug, Clone)]
pub struct BackendPool {
    backends: Arc<Vec<Backend>>,
}

/// Runtime state for a single backend server.
#[derive(Debug, Clone)]
pub struct Backend {
    state: Arc<InnerState>,
}

#[derive(Debug)]
struct InnerState {
    /// Human-readable label for logs and metrics.
    name: String,
    /// The validated backend URI.
    uri: hyper::Uri,
    /// Requests routed to this backend since process start.
    requests: AtomicU64,
    /// Whether this backend is currently considered healthy.
    healthy: AtomicBool,
}

impl BackendPool {
    /// Constructs a pool from validated backend configurations, marking
    /// all backends as initially healthy.
    pub fn from_validated(backends: &[ValidatedBackend]) -> Self {
        let backends = backends.iter().map(Backend::new).collect();
        Self {
            backends: Arc::new(backends),
        }
    }

    /// Returns a slice of all backends (healthy and unhealthy), in
    /// configuration order.
    pub fn all(&self) -> &[Backend] {
        &self.backends
    }

    /// Returns the backend at the given position, if any.
    pub fn get(&self, idx: usize) -> Option<&Backend> {
        self.backends.get(idx)
    }

    /// Returns the total number of configured backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` if no backends are configured.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Backend {
    /// Creates a new healthy backend from a validated configuration entry.
    pub fn new(backend: &ValidatedBackend) -> Self {
        Self {
            state: Arc::new(InnerState {
                name: backend.name.clone(),
                uri: backend.uri.clone(),
                requests: AtomicU64::new(0),
                healthy: AtomicBool::new(true),
            }),
        }
    }

    /// Returns the backend's display name.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Returns the backend URI.
    pub fn uri(&self) -> &hyper::Uri {
        &self.state.uri
    }

    /// Returns `true` if this backend is currently healthy.
    pub fn is_healthy(&self) -> bool {
        self.state.healthy.load(Ordering::Acquire)
    }

    /// Writes the health flag unconditionally and returns the previous
    /// value, letting the caller detect edge transitions.
    pub fn set_healthy(&self, healthy: bool) -> bool {
        self.state.healthy.swap(healthy, Ordering::AcqRel)
    }

    /// Counts one request routed to this backend.
    pub fn record_request(&self) {
        self.state.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of requests routed to this backend so far.
    pub fn request_count(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }
}
