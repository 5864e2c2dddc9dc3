//! HTTP header processing: hop-by-hop removal, forwarding header
//! injection, and host rewriting.
//!
//! Implements the header-level requirements of RFC 7230 Section 6.1
//! (hop-by-hop header handling) and the de-facto `X-Forwarded-*`
//! convention for reverse proxies.

use std::net::SocketAddr;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::http::uri::Authority;

/// The standard hop-by-hop set from RFC 7230 Section 6.1.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Removes all hop-by-hop headers from the given header map: the
/// [`HOP_BY_HOP`] set plus any additional header names declared in the
/// `Connection` header value.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let declared: Vec<HeaderName> = match headers.get(hyper::header::CONNECTION) {
        Some(val) => val
            .to_str()
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| HeaderName::from_bytes(s.trim().as_bytes()).ok())
            .collect(),
        None => Vec::new(),
    };

    for name in declared {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Injects `X-Forwarded-For`, `X-Forwarded-Proto`, and `X-Forwarded-Host`
/// headers into the given header map.
///
/// - `X-Forwarded-For` is appended to any existing value (preserving
///   upstream proxy chains) with the client's socket address.
/// - `X-Forwarded-Proto` is set to `"http"`.
/// - `X-Forwarded-Host` is set to the original `Host` header value, if present.
pub fn inject_forwarding_headers(headers: &mut HeaderMap, client_addr: SocketAddr) {
    let client_ip = client_addr.ip().to_string();

    let xff_value = match headers
        .get("x-forwarded-for")
        .and_then(|existing| existing.to_str().ok())
    {
        Some(chain) => format!("{chain}, {client_ip}"),
        None => client_ip,
    };

    if let Ok(val) = HeaderValue::from_str(&xff_value) {
        headers.insert("x-forwarded-for", val);
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    if let Some(host) = headers.get(hyper::header::HOST) {
        headers.insert("x-forwarded-host", host.clone());
    }
}

/// Rewrites the `Host` header to match the backend authority.
///
/// This ensures the backend receives the correct `Host` value regardless
/// of what the client originally sent.
pub fn rewrite_host(headers: &mut HeaderMap, backend_auth: &Authority) {
    if let Ok(val) = HeaderValue::from_str(backend_auth.as_str()) {
        headers.insert(hyper::header::HOST, val);
    }
}
