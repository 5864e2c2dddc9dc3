//!
//! A round-robin HTTP load balancer built on [Hyper].
//!
//! Distributes inbound requests across a fixed pool of backend servers,
//! actively probes each backend's health endpoint in the background, and
//! exposes a live metrics snapshot plus a dashboard on reserved paths.
//!
//! [Hyper]: https://hyper.rs/

pub mod assets;
pub mod backend;
pub mod balancer;
pub mod config;
pub mod error;
pub mod headers;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod server;

pub use backend::{Backend, BackendPool};
pub use balancer::LoadBalancer;
pub use config::{BackendConfig, Config, HealthCheckConfig, RuntimeConfig, ValidatedBackend};
pub use error::ProxyError;
pub use health::spawn_health_checker;
pub use metrics::{BackendSnapshot, MetricsSnapshot, ProxyStats, snapshot};
pub use proxy::{BoxBody, HttpClient, build_client, handle_request};
pub use server::{ServerState, serve, shutdown_signal};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProxyError>;
