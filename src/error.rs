//! Error types and HTTP status code mapping.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode};

use crate::BoxBody;

/// Every failure the balancer can produce, each mapping to a specific
/// HTTP status.
#[derive(Debug)]
pub enum ProxyError {
    /// The configuration file could not be loaded or parsed.
    Config(String),
    /// A backend address is malformed or unparseable.
    InvalidBackend(String),
    /// Every configured backend is currently marked unhealthy.
    NoHealthyBackend,
    /// The concurrency limit was reached and the request was shed.
    ServiceUnavailable {
        /// The configured in-flight request limit.
        limit: usize,
    },
    /// The selected backend refused the connection or failed mid-relay.
    Upstream(hyper_util::client::legacy::Error),
    /// The relay to the selected backend exceeded the request timeout.
    Timeout(Duration),
    /// An internal error that does not fit other categories.
    Internal(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidBackend(msg) => write!(f, "invalid backend: {msg}"),
            Self::NoHealthyBackend => write!(f, "all backends are unavailable"),
            Self::ServiceUnavailable { limit } => {
                write!(f, "concurrency limit of {limit} in-flight requests reached")
            }
            Self::Upstream(e) => write!(f, "upstream error: {e}"),
            Self::Timeout(d) => write!(f, "upstream request timed out after {d:?}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    /// Returns the HTTP status code corresponding to this error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::InvalidBackend(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NoHealthyBackend | Self::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Converts this error into an HTTP response with a JSON body.
    pub fn into_response(self) -> Response<BoxBody> {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": match &self {
                Self::Config(_) => "config_error",
                Self::InvalidBackend(_) => "invalid_backend",
                Self::NoHealthyBackend => "no_healthy_backend",
                Self::ServiceUnavailable { .. } => "overloaded",
                Self::Upstream(_) => "upstream_error",
                Self::Timeout(_) => "timeout",
                Self::Internal(_) => "internal_error",
            },
            "message": self.to_string(),
        });

        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(full_body(body.to_string()))
            .unwrap_or_else(|_| {
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(full_body(""))
                    .expect("building fallback response must not fail")
            })
    }
}

/// Wraps static content into a [`BoxBody`] for locally built responses.
pub(crate) fn full_body(content: impl Into<Bytes>) -> BoxBody {
    Full::new(content.into())
        .map_err(|never| -> Box<dyn std::error::Error + Send + Sync> { match never {} })
        .boxed()
}

impl From<hyper::Error> for ProxyError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<hyper::http::Error> for ProxyError {
    fn from(err: hyper::http::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
