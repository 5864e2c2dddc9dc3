//! Round-robin load balancer.
//!
//! Distributes requests across healthy backends in registry order. Uses a
//! single [`AtomicUsize`] cursor for lock-free, contention-minimized
//! selection: every selection attempt consumes exactly one turn, so
//! concurrent callers never resolve the same turn twice and healthy
//! backends are visited in a fair rotation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{Backend, BackendPool};
use crate::{ProxyError, Result};

/// A round-robin selector over a [`BackendPool`].
///
/// Selection is lock-free and safe to call concurrently from multiple
/// request handlers. The balancer never modifies backend health state;
/// it only reads it. A backend may flip unhealthy between being chosen
/// and being dispatched to; the forwarding path tolerates that window.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pool: BackendPool,
    /// Monotonic cursor advanced on each selection attempt.
    cursor: Arc<AtomicUsize>,
}

impl LoadBalancer {
    /// Creates a new round-robin balancer over the given pool, with the
    /// cursor starting at the first backend.
    pub fn new(pool: BackendPool) -> Self {
        Self {
            pool,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Selects the next healthy backend.
    ///
    /// Makes up to `N` attempts (`N` = pool size), advancing the cursor
    /// once per attempt and returning the first healthy backend reached.
    /// If a full rotation finds none, returns
    /// [`ProxyError::NoHealthyBackend`].
    pub fn next(&self) -> Result<Backend> {
        let total = self.pool.len();
        if total == 0 {
            return Err(ProxyError::NoHealthyBackend);
        }

        for _ in 0..total {
            let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
            if let Some(backend) = self.pool.get(turn % total) {
                if backend.is_healthy() {
                    return Ok(backend.clone());
                }
            }
        }

        Err(ProxyError::NoHealthyBackend)
    }

    /// Returns a reference to the underlying backend pool.
    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }
}
