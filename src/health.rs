//! Active health checking of backend servers.
//!
//! A background task wakes on a fixed interval and issues one GET probe
//! per backend against the configured health path. Probes run on their
//! own tasks so a hung backend never delays the others or the next cycle;
//! total in-flight probes are bounded by a semaphore. The health flag is
//! written unconditionally every cycle, and transitions are logged
//! edge-triggered.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendPool};
use crate::RuntimeConfig;

/// Upper bound on concurrently running probes across all backends.
const MAX_CONCURRENT_PROBES: usize = 32;

/// The lightweight client type used for health probes.
pub type ProbeClient = Client<HttpConnector, Empty<Bytes>>;

/// Constructs the client used for health probes.
fn build_probe_client() -> ProbeClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Spawns the background health check loop.
///
/// Each cycle probes every backend concurrently and updates its health
/// flag from the result. The loop runs for the process lifetime; probe
/// failures are never escalated past the flag write.
pub fn spawn_health_checker(
    pool: BackendPool,
    config: Arc<RuntimeConfig>,
) -> tokio::task::JoinHandle<()> {
    let client = build_probe_client();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.health_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            for backend in pool.all() {
                let uri = match probe_uri(backend, &config.health_path) {
                    Some(uri) => uri,
                    None => {
                        warn!(
                            backend = backend.name(),
                            address = %backend.uri(),
                            "failed to build health probe URI"
                        );
                        continue;
                    }
                };

                let backend = backend.clone();
                let client = client.clone();
                let semaphore = Arc::clone(&semaphore);
                let probe_timeout = config.probe_timeout;

                // Probes are not awaited; the ticker keeps its cadence
                // even if one backend hangs until the probe timeout.
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let alive = probe(&client, uri, probe_timeout).await;
                    apply_probe_result(&backend, alive);
                });
            }
        }
    })
}

/// Issues a single liveness probe. Returns `true` only if the transport
/// succeeded and the response status indicates success.
async fn probe(client: &ProbeClient, uri: hyper::Uri, probe_timeout: Duration) -> bool {
    match tokio::time::timeout(probe_timeout, client.get(uri.clone())).await {
        Ok(Ok(resp)) if resp.status().is_success() => true,
        Ok(Ok(resp)) => {
            debug!(%uri, status = resp.status().as_u16(), "health probe returned non-success");
            false
        }
        Ok(Err(e)) => {
            debug!(%uri, error = %e, "health probe failed");
            false
        }
        Err(_) => {
            debug!(%uri, timeout = ?probe_timeout, "health probe timed out");
            false
        }
    }
}

/// Writes the probe outcome to the backend's health flag, logging only
/// on transitions.
fn apply_probe_result(backend: &Backend, alive: bool) {
    let was_healthy = backend.set_healthy(alive);
    match (was_healthy, alive) {
        (true, false) => warn!(
            backend = backend.name(),
            address = %backend.uri(),
            "backend went offline"
        ),
        (false, true) => info!(
            backend = backend.name(),
            address = %backend.uri(),
            "backend is back online"
        ),
        _ => {}
    }
}

/// Builds the probe URI for a backend from its address and the configured
/// health path.
fn probe_uri(backend: &Backend, path: &str) -> Option<hyper::Uri> {
    let uri = backend.uri();
    format!(
        "{}://{}{}",
        uri.scheme_str()?,
        uri.authority()?.as_str(),
        path,
    )
    .parse()
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatedBackend;

    fn test_backend(addr: &str) -> Backend {
        Backend::new(&ValidatedBackend {
            name: "b1".into(),
            uri: addr.parse().unwrap(),
        })
    }

    #[test]
    fn probe_uri_appends_health_path() {
        let backend = test_backend("http://127.0.0.1:5000");
        let uri = probe_uri(&backend, "/health").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:5000/health");
    }

    #[test]
    fn apply_probe_result_flips_flag_both_ways() {
        let backend = test_backend("http://127.0.0.1:5000");

        apply_probe_result(&backend, false);
        assert!(!backend.is_healthy());

        // Repeated failure keeps the flag down without a transition.
        apply_probe_result(&backend, false);
        assert!(!backend.is_healthy());

        apply_probe_result(&backend, true);
        assert!(backend.is_healthy());
    }

    #[tokio::test]
    async fn probe_reports_connection_refused_as_dead() {
        let client = build_probe_client();
        // Port 1 on localhost is refused immediately.
        let uri = "http://127.0.0.1:1/health".parse().unwrap();
        assert!(!probe(&client, uri, Duration::from_millis(500)).await);
    }
}
