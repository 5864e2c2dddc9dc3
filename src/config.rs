//! Configuration loading, validation, and pre-parsed runtime state.
//!
//! The balancer reads its YAML configuration exactly once at startup.
//! Backend addresses are parsed and validated at load time so the hot
//! path never touches the filesystem or re-parses URIs.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ProxyError, Result};

/// Default socket address the balancer binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";

/// Default interval between active health check cycles.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Default path for active health check probes.
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/health";

/// Default timeout for a single health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total request timeout covering the entire upstream round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle timeout for pooled upstream connections.
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum number of idle connections kept per backend host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Default maximum number of concurrent in-flight requests the balancer
/// will handle before returning 503 Service Unavailable.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Default directory for the dashboard page and its assets.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Raw configuration as deserialized from the YAML file.
///
/// This struct maps directly to the on-disk schema. After loading, it is
/// transformed into a [`RuntimeConfig`] that holds validated backend URIs
/// and concrete durations.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Socket address the balancer listens on (default `"127.0.0.1:8000"`).
    #[serde(default)]
    pub listen: Option<String>,
    /// The fixed set of backend servers to balance across.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Directory serving the dashboard page and static assets
    /// (default `"static"`).
    #[serde(default)]
    pub static_dir: Option<String>,
    /// Active health check settings.
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    /// Total request timeout in milliseconds covering the entire upstream
    /// round-trip (default: 30000). Requests exceeding this receive 504.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Maximum concurrent in-flight requests before returning 503
    /// Service Unavailable (default: 1000).
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,
}

/// Configuration for a single backend server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Human-readable label shown in logs and metrics. Defaults to
    /// `backend-{position}` when omitted.
    #[serde(default)]
    pub name: Option<String>,
    /// The backend address, scheme and authority only
    /// (e.g. `"http://127.0.0.1:5000"`). Addresses carrying a path or
    /// query are rejected at load time.
    pub address: String,
}

/// Active health check settings.
///
/// The balancer always runs the health check loop; these fields only tune
/// its cadence and probe target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheckConfig {
    /// HTTP path to probe (default: `/health`).
    #[serde(default = "default_health_path")]
    pub path: String,
    /// Interval between health check cycles in milliseconds (default: 5000).
    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,
    /// Timeout for a single probe in milliseconds (default: 5000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_CHECK_PATH.into()
}

fn default_health_interval_ms() -> u64 {
    DEFAULT_HEALTH_CHECK_INTERVAL.as_millis() as u64
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval_ms: default_health_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Validated backend descriptor produced from [`BackendConfig`].
#[derive(Debug, Clone)]
pub struct ValidatedBackend {
    /// Human-readable label for logs and metrics.
    pub name: String,
    /// The parsed and validated backend URI.
    pub uri: hyper::Uri,
}

/// Fully validated, ready-to-use configuration.
///
/// Created once at startup and shared across all handlers and background
/// tasks via `Arc`. Contains every value the balancer needs at runtime.
#[derive(Debug)]
pub struct RuntimeConfig {
    /// Socket address the balancer binds to.
    pub listen: SocketAddr,
    /// Validated backends, in configuration order. Never resized.
    pub backends: Vec<ValidatedBackend>,
    /// Directory serving the dashboard page and static assets.
    pub static_dir: PathBuf,
    /// HTTP path polled on each backend by the health checker.
    pub health_path: String,
    /// Interval between health check cycles.
    pub health_interval: Duration,
    /// Timeout bounding a single health probe.
    pub probe_timeout: Duration,
    /// Total request timeout for the upstream round-trip. Expiry yields 504.
    pub request_timeout: Duration,
    /// Idle timeout for pooled upstream connections.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per backend host.
    pub pool_max_idle_per_host: usize,
    /// Maximum concurrent in-flight requests. Overflow yields 503.
    pub max_concurrent_requests: usize,
}

/// Validates a single backend entry, returning a [`ValidatedBackend`].
fn validate_backend(config: &BackendConfig, position: usize) -> Result<ValidatedBackend> {
    if config.address.is_empty() {
        return Err(ProxyError::InvalidBackend(
            "backend address must not be empty".into(),
        ));
    }

    let uri = config
        .address
        .parse::<hyper::Uri>()
        .map_err(|e| ProxyError::InvalidBackend(format!("{}: {e}", config.address)))?;

    uri.authority().ok_or_else(|| {
        ProxyError::InvalidBackend(format!("backend URI has no authority: {}", config.address))
    })?;

    uri.scheme().ok_or_else(|| {
        ProxyError::InvalidBackend(format!("backend URI has no scheme: {}", config.address))
    })?;

    // Probe and proxy URIs are built from scheme + authority alone, so a
    // path or query on the address would be silently ignored.
    if let Some(pq) = uri.path_and_query() {
        if !pq.as_str().is_empty() && pq.as_str() != "/" {
            return Err(ProxyError::InvalidBackend(format!(
                "backend URI must not have a path or query: {}",
                config.address
            )));
        }
    }

    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("backend-{}", position + 1));

    Ok(ValidatedBackend { name, uri })
}

impl Config {
    /// Loads configuration from a YAML file at the given path.
    ///
    /// Returns a [`ProxyError::Config`] if the file cannot be opened or
    /// its contents fail YAML deserialization.
    pub fn load_from_file(file_path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let file = std::fs::File::open(file_path).map_err(|e| {
            ProxyError::Config(format!(
                "failed to open {}: {e}",
                file_path.as_ref().display()
            ))
        })?;

        serde_yaml::from_reader(file)
            .map_err(|e| ProxyError::Config(format!("failed to parse config: {e}")))
    }

    /// Validates all fields, producing a [`RuntimeConfig`] suitable for
    /// the balancer hot path.
    ///
    /// At least one backend must be configured.
    pub fn into_runtime(self) -> Result<RuntimeConfig> {
        if self.backends.is_empty() {
            return Err(ProxyError::Config(
                "at least one backend must be configured".into(),
            ));
        }

        let listen_str = self.listen.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR);
        let listen = listen_str.parse::<SocketAddr>().map_err(|e| {
            ProxyError::Config(format!("invalid listen address \"{listen_str}\": {e}"))
        })?;

        let backends = self
            .backends
            .iter()
            .enumerate()
            .map(|(i, b)| validate_backend(b, i))
            .collect::<Result<Vec<_>>>()?;

        let static_dir = PathBuf::from(self.static_dir.as_deref().unwrap_or(DEFAULT_STATIC_DIR));

        let request_timeout = self
            .request_timeout_ms
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);

        Ok(RuntimeConfig {
            listen,
            backends,
            static_dir,
            health_path: self.health_check.path,
            health_interval: Duration::from_millis(self.health_check.interval_ms),
            probe_timeout: Duration::from_millis(self.health_check.probe_timeout_ms),
            request_timeout,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            max_concurrent_requests: self
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
        })
    }
}
