//! service-resilience daemon.
//!
//! Loads configuration, builds the breaker registry and health aggregator,
//! registers the configured reachability checks and serves the admin API
//! until SIGINT or SIGTERM.
//!
//! ```text
//! service-resilience [config.toml]
//! ```

use std::error::Error;
use std::path::PathBuf;
use tokio::net::TcpListener;

use service_resilience::admin::{self, AdminState};
use service_resilience::config::loader::load_config;
use service_resilience::config::ResilienceConfig;
use service_resilience::lifecycle::signals::spawn_signal_handler;
use service_resilience::lifecycle::{Components, Shutdown};
use service_resilience::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => load_config(&path)?,
        None => ResilienceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-resilience starting");
    tracing::info!(
        failure_threshold = config.circuit_breaker.failure_threshold,
        max_attempts = config.retries.max_attempts,
        dependencies = config.dependencies.len(),
        health_checks = config.health.checks.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = Components::build(&config);
    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    if config.admin.enabled {
        let state = AdminState::new(
            components.registry.clone(),
            components.health.clone(),
            config.admin.api_key.clone(),
        );
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        admin::serve(listener, admin::setup_admin_router(state), shutdown).await?;
    } else {
        tracing::info!("Admin API disabled; waiting for shutdown signal");
        shutdown.recv().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
