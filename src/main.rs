use std::sync::Arc;

use rondo::{Config, ServerState, build_client, serve, shutdown_signal, spawn_health_checker};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./Config.yml";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());

    let config = Config::load_from_file(&config_path)
        .and_then(Config::into_runtime)
        .unwrap_or_else(|e| {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        });
    let config = Arc::new(config);

    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("fatal: failed to bind {}: {e}", config.listen);
            std::process::exit(1);
        }
    };

    let state = ServerState::new(Arc::clone(&config));
    let client = build_client(&config);

    info!(backends = config.backends.len(), "starting load balancer");
    info!("dashboard  -> http://{}/dashboard", config.listen);
    info!("metrics    -> http://{}/metrics", config.listen);
    info!("balancer   -> http://{}/", config.listen);

    spawn_health_checker(state.pool().clone(), Arc::clone(&config));

    info!(listen = %config.listen, "listening");
    serve(listener, client, state, shutdown_signal()).await;
}
