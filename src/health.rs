//! Health probes and Prometheus metrics.
//!
//! Provides:
//! - `/health` - Liveness probe (always returns 200 `OK` if the server is running)
//! - `/readyz` - Readiness probe (returns 503 once shutdown has begun)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;

use crate::webhooks::Outcome;

/// Labels for admission metrics (kind + outcome)
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AdmissionLabels {
    pub kind: String,
    pub outcome: String,
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission requests by kind and outcome
    pub admissions_total: Family<AdmissionLabels, Counter>,
    /// JSON-Patch operations returned to the API server
    pub patches_total: Counter,
    /// Requests rejected before an AdmissionReview could be answered
    pub transport_errors_total: Counter,
    /// Time spent handling an admission request
    pub admission_duration_seconds: Histogram,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admissions_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "gpu_pool_webhook_admissions",
            "Total number of admission requests",
            admissions_total.clone(),
        );

        let patches_total = Counter::default();
        registry.register(
            "gpu_pool_webhook_patches",
            "Total number of JSON-Patch operations emitted",
            patches_total.clone(),
        );

        let transport_errors_total = Counter::default();
        registry.register(
            "gpu_pool_webhook_transport_errors",
            "Total number of undecodable admission requests",
            transport_errors_total.clone(),
        );

        let admission_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 15));
        registry.register(
            "gpu_pool_webhook_admission_duration_seconds",
            "Duration of admission handling in seconds",
            admission_duration_seconds.clone(),
        );

        Self {
            admissions_total,
            patches_total,
            transport_errors_total,
            admission_duration_seconds,
            registry,
        }
    }

    /// Record a reviewed admission request
    pub fn record_admission(
        &self,
        kind: &str,
        outcome: Outcome,
        patches: usize,
        duration_secs: f64,
    ) {
        let labels = AdmissionLabels {
            kind: kind.to_string(),
            outcome: outcome.as_str().to_string(),
        };
        self.admissions_total.get_or_create(&labels).inc();
        self.patches_total.inc_by(patches as u64);
        self.admission_duration_seconds.observe(duration_secs);
    }

    /// Record a request that never reached review
    pub fn record_transport_error(&self) {
        self.transport_errors_total.inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for health probes
pub struct HealthState {
    /// Whether the webhook accepts traffic
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable while starting or shutting down.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
