//! gpu-pool-webhook - Kubernetes mutating admission webhook for GPU pools.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Serves the webhook over TLS until SIGTERM or SIGINT

use std::sync::Arc;

use tokio::signal;
use tracing::{debug, info};

use gpu_pool_webhook::{
    HealthState, MutationEngine, WebhookConfig, WebhookState, run_webhook_server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gpu_pool_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting gpu-pool-webhook");

    // Several crates enable rustls providers; pick one explicitly
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = WebhookConfig::from_env()?;
    info!(
        cert_path = %config.cert_path.display(),
        key_path = %config.key_path.display(),
        port = config.port,
        "Loaded configuration"
    );

    let engine = MutationEngine::default();
    info!(rules = ?engine.rule_names(), "Registered mutation rules");

    let state = Arc::new(WebhookState::new(engine, Arc::new(HealthState::new())));
    run_webhook_server(&config, state, shutdown_signal()).await?;

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
