//! gpu-pool-webhook library crate
//!
//! A Kubernetes mutating admission webhook that turns GPU pool annotations on
//! Pods into a KAI scheduler queue label and an `nvidia.com/gpu` limit.

pub mod config;
pub mod error;
pub mod health;
pub mod webhooks;

pub use config::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookConfig};
pub use error::{AdmissionError, WebhookError};
pub use health::HealthState;
pub use webhooks::{MutationEngine, WebhookState, run_webhook_server};
