//! Admission webhook server.
//!
//! Provides HTTP endpoints for the Kubernetes mutating admission webhook:
//! - `POST /mutate` - AdmissionReview in, AdmissionReview out
//! - `GET /health`, `GET /readyz`, `GET /metrics` - see [`crate::health`]
//!
//! To enable the webhook:
//! 1. Issue a serving certificate for the webhook Service (e.g. with cert-manager)
//! 2. Create a MutatingWebhookConfiguration pointing at `/mutate`
//! 3. Mount the certificate secret at /etc/certs/ (or set TLS_CERT_FILE / TLS_PRIVATE_KEY_FILE)

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{error, info, warn};

use crate::config::WebhookConfig;
use crate::error::{AdmissionError, WebhookError};
use crate::health::{self, HealthState};
use crate::webhooks::review::{decode_review, encode_review, review_request};
use crate::webhooks::rules::MutationEngine;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub engine: MutationEngine,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(engine: MutationEngine, health: Arc<HealthState>) -> Self {
        Self { engine, health }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Create the webhook router, including health endpoints
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let health = health::create_router(state.health.clone());
    Router::new()
        .route("/mutate", post(mutate))
        .with_state(state)
        .merge(health)
}

/// Mutating admission handler
async fn mutate(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let started = Instant::now();
    let metrics = &state.health.metrics;

    let review = match decode_review(&body) {
        Ok(review) => review,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            metrics.record_transport_error();
            return e.into_response();
        }
    };

    let reviewed = review_request(&state.engine, &review);
    let request = &review.request;
    metrics.record_admission(
        &request.kind.kind,
        reviewed.outcome,
        reviewed.patch_count,
        started.elapsed().as_secs_f64(),
    );

    match encode_review(reviewed.response) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to encode admission response");
            e.into_response()
        }
    }
}

/// Run the webhook server with TLS until `shutdown` completes.
///
/// Once `shutdown` resolves the server is marked not ready and in-flight
/// requests get `config.shutdown_timeout` to finish.
pub async fn run_webhook_server<F>(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
    shutdown: F,
) -> Result<(), WebhookError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let handle = Handle::new();
    let app = create_webhook_router(state.clone());
    let addr = config.listen_addr();

    {
        let handle = handle.clone();
        let health = state.health.clone();
        let grace = config.shutdown_timeout;
        tokio::spawn(async move {
            shutdown.await;
            warn!(grace_secs = grace.as_secs(), "Shutting down webhook server");
            health.set_ready(false).await;
            handle.graceful_shutdown(Some(grace));
        });
    }

    {
        let handle = handle.clone();
        let health = state.health.clone();
        tokio::spawn(async move {
            if let Some(addr) = handle.listening().await {
                info!(%addr, "Webhook server listening with TLS");
                health.set_ready(true).await;
            }
        });
    }

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Webhook server stopped");
    Ok(())
}
