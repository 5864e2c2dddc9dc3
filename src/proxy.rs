//! Core forwarding pipeline: backend selection, counting, and relay.
//!
//! Every inbound request is assigned a monotonically increasing request ID
//! and wrapped in a [`tracing::Span`] carrying structured fields for
//! observability. The pipeline selects the next healthy backend via the
//! round-robin balancer, counts the dispatch, rewrites the request to
//! target that backend, and streams the response back to the caller.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, warn};

use crate::{LoadBalancer, ProxyError, ProxyStats, Result, RuntimeConfig, headers};

/// An alias to simplify the calls to `Box<dyn std::error::Error + Send + Sync>`.
type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased body used for both request forwarding and response streaming.
///
/// Wraps any body implementation behind a single boxed trait object,
/// allowing the handler to accept requests with arbitrary body types
/// (e.g. `Incoming`, `Full<Bytes>`, `Empty<Bytes>`) and return a uniform
/// response type regardless of origin.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, StdError>;

/// The HTTP client type used for backend connections.
pub type HttpClient = Client<HttpConnector, BoxBody>;

/// Global monotonic counter for assigning unique request IDs.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Constructs a new [`HttpClient`] for backend connections.
pub fn build_client(config: &RuntimeConfig) -> HttpClient {
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(HttpConnector::new())
}

/// Processes a single inbound request through the forwarding pipeline.
///
/// The pipeline performs the following steps in order:
///
/// 1. **Backend selection** — The round-robin balancer selects the next
///    healthy backend. If none are available, returns
///    [`ProxyError::NoHealthyBackend`] (503) without touching any counter.
/// 2. **Counting** — The selected backend's request counter and the
///    process-wide total are incremented before the relay. Attempted
///    dispatches are counted, not successful ones.
/// 3. **Hop-by-hop stripping** — Connection-scoped headers are removed
///    before forwarding, per RFC 7230 Section 6.1.
/// 4. **Forwarding headers** — `X-Forwarded-For`, `X-Forwarded-Proto`,
///    and `X-Forwarded-Host` are injected to preserve client origin
///    metadata, and `Host` is rewritten to the backend authority.
/// 5. **URI rewriting** — The request URI is rewritten to target the
///    selected backend, preserving the original path and query string.
/// 6. **Body streaming** — The request body is passed through to the
///    backend without buffering, bounded by the configured request
///    timeout.
/// 7. **Response relay** — The backend response is returned with
///    hop-by-hop headers stripped, otherwise verbatim.
///
/// Relay failures are not retried against an alternate backend; the
/// health checker will mark a dead backend unhealthy on its next cycle.
/// The handler never writes health flags itself.
pub async fn handle_request<B>(
    req: Request<B>,
    client: HttpClient,
    config: Arc<RuntimeConfig>,
    balancer: LoadBalancer,
    stats: ProxyStats,
    client_addr: SocketAddr,
) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<StdError>,
{
    let request_id = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    let method = req.method().clone();
    let uri = req.uri().clone();

    let span = tracing::info_span!(
        "request",
        id = request_id,
        method = %method,
        uri = %uri,
        client = %client_addr,
    );

    async move {
        let backend = balancer.next().inspect_err(|_| {
            warn!("no healthy backend available");
        })?;

        backend.record_request();
        stats.record_request();
        info!(
            backend = backend.name(),
            total = stats.total_requests(),
            "routing request"
        );

        let backend_uri = backend.uri();
        let rewritten_uri = rewrite_uri(&uri, backend_uri)?;
        let (mut parts, body) = req.into_parts();

        headers::strip_hop_by_hop(&mut parts.headers);
        headers::inject_forwarding_headers(&mut parts.headers, client_addr);
        headers::rewrite_host(
            &mut parts.headers,
            backend_uri
                .authority()
                .ok_or_else(|| ProxyError::InvalidBackend("backend has no authority".into()))?,
        );

        parts.uri = rewritten_uri;

        debug!(
            headers = ?parts.headers,
            backend_uri = %parts.uri,
            "forwarding request"
        );

        let start = std::time::Instant::now();
        let boxed_body = body.map_err(|e| e.into()).boxed();
        let proxy_req = Request::from_parts(parts, boxed_body);

        let relay_result = timeout(config.request_timeout, client.request(proxy_req)).await;

        let mut backend_resp = match relay_result {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    backend = backend.name(),
                    "relay to backend failed"
                );
                return Err(ProxyError::Upstream(e));
            }
            Err(_elapsed) => {
                warn!(
                    timeout = ?config.request_timeout,
                    backend = backend.name(),
                    "relay to backend timed out"
                );
                return Err(ProxyError::Timeout(config.request_timeout));
            }
        };

        info!(
            status = backend_resp.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            backend = backend.name(),
            "backend responded"
        );

        headers::strip_hop_by_hop(backend_resp.headers_mut());

        let (resp_parts, resp_body) = backend_resp.into_parts();
        Ok(Response::from_parts(
            resp_parts,
            resp_body.map_err(|e| -> StdError { Box::new(e) }).boxed(),
        ))
    }
    .instrument(span)
    .await
}

/// Rewrites the original request URI to target the selected backend,
/// preserving the path and query string.
fn rewrite_uri(original: &Uri, backend: &Uri) -> Result<Uri> {
    let authority = backend
        .authority()
        .ok_or_else(|| ProxyError::InvalidBackend("backend has no authority".into()))?;

    let scheme = backend
        .scheme()
        .ok_or_else(|| ProxyError::InvalidBackend("backend has no scheme".into()))?;

    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(scheme.clone())
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::Internal(format!("failed to build backend URI: {e}")))
}
