//! Server accept loop, path routing, and graceful shutdown.
//!
//! Contains the runtime infrastructure that sits between the TCP listener
//! and the per-request forwarding pipeline. This module is intentionally
//! decoupled from `main()` so that the server logic remains testable
//! and reusable without pulling in process-level concerns like signal
//! handling or `std::process::exit`.
//!
//! Three reserved paths are handled locally: `/metrics` returns the JSON
//! snapshot, `/dashboard` serves the dashboard page, and `/static/*`
//! serves assets from the configured static directory. Every other path
//! is proxy traffic.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::full_body;
use crate::{
    BackendPool, BoxBody, HttpClient, LoadBalancer, ProxyError, ProxyStats, RuntimeConfig, assets,
    handle_request, metrics,
};

/// Runtime state shared across the accept loop.
#[derive(Clone)]
pub struct ServerState {
    /// Validated configuration shared by all handlers.
    pub config: Arc<RuntimeConfig>,
    /// Round-robin balancer over the backend pool.
    pub balancer: LoadBalancer,
    /// Aggregate request counters and process start time.
    pub stats: ProxyStats,
    /// Bounds the number of concurrent in-flight proxied requests.
    pub semaphore: Arc<Semaphore>,
    /// Cached value of the semaphore capacity, used in error messages.
    pub concurrency_limit: usize,
}

impl ServerState {
    /// Assembles the shared state from a validated configuration.
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        let pool = BackendPool::from_validated(&config.backends);
        let concurrency_limit = config.max_concurrent_requests;
        Self {
            config,
            balancer: LoadBalancer::new(pool),
            stats: ProxyStats::new(),
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
        }
    }

    /// Returns the backend pool shared with the health checker and metrics.
    pub fn pool(&self) -> &BackendPool {
        self.balancer.pool()
    }
}

/// Accepts connections on `listener` and dispatches them through the
/// routing and forwarding pipeline using the given `client` and shared
/// `state`.
///
/// Runs until `shutdown` resolves, then stops accepting new connections
/// and returns. In-flight requests on already-spawned tasks continue
/// to completion independently.
pub async fn serve(
    listener: TcpListener,
    client: HttpClient,
    state: ServerState,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, client_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(%e, "failed to accept connection");
                        continue;
                    }
                };

                let client = client.clone();
                let state = state.clone();

                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let client = client.clone();
                        let state = state.clone();
                        async move {
                            let resp = route(req, client, state, client_addr).await;
                            Ok::<Response<BoxBody>, std::convert::Infallible>(resp)
                        }
                    });

                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await
                    {
                        warn!(%e, "connection error");
                    }
                });
            }
            () = &mut shutdown => {
                info!("shutting down, no longer accepting connections");
                break;
            }
        }
    }
}

/// Dispatches a request to the reserved-path handlers or the forwarding
/// pipeline.
async fn route(
    req: Request<Incoming>,
    client: HttpClient,
    state: ServerState,
    client_addr: SocketAddr,
) -> Response<BoxBody> {
    match req.uri().path() {
        "/metrics" => metrics_response(&state),
        "/dashboard" => assets::serve_dashboard(&state.config.static_dir).await,
        path if path.starts_with("/static/") => {
            assets::serve_static(&state.config.static_dir, path).await
        }
        _ => {
            let _permit = match state.semaphore.try_acquire() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(
                        limit = state.concurrency_limit,
                        "concurrency limit reached, rejecting request"
                    );
                    return ProxyError::ServiceUnavailable {
                        limit: state.concurrency_limit,
                    }
                    .into_response();
                }
            };

            handle_request(
                req,
                client,
                Arc::clone(&state.config),
                state.balancer.clone(),
                state.stats.clone(),
                client_addr,
            )
            .await
            .unwrap_or_else(ProxyError::into_response)
        }
    }
}

/// Builds the `/metrics` response: the current snapshot as JSON, with a
/// permissive CORS header so the dashboard can poll it from anywhere.
fn metrics_response(state: &ServerState) -> Response<BoxBody> {
    let snapshot = metrics::snapshot(state.pool(), &state.stats);
    let body = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(e) => return ProxyError::Internal(e.to_string()).into_response(),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .header("access-control-allow-origin", "*")
        .body(full_body(body))
        .unwrap_or_else(|e| ProxyError::Internal(e.to_string()).into_response())
}

/// Awaits a shutdown signal (SIGINT or SIGTERM on Unix, Ctrl+C on all
/// platforms). Returns once the first signal is received.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, initiating graceful shutdown");
    }
}
