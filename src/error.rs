//! Error types for the webhook.
//!
//! [`AdmissionError`] classifies failures while handling an admission request
//! by the HTTP status they map to. [`WebhookError`] covers server bootstrap.

use axum::http::StatusCode;
use thiserror::Error;

use crate::webhooks::rules::RuleError;

/// Error while handling a single admission request
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Body is not a usable AdmissionReview. No UID to answer against.
    #[error("Invalid AdmissionReview: {0}")]
    Transport(String),

    /// A mutation rule rejected the Pod
    #[error("{0}")]
    Validation(#[from] RuleError),

    /// The embedded object could not be decoded as a Pod
    #[error("failed to decode pod: {0}")]
    MalformedResource(String),

    /// The response envelope could not be serialized
    #[error("failed to encode admission response: {0}")]
    Encoding(String),
}

impl AdmissionError {
    /// HTTP status for this error.
    ///
    /// Semantic rejections are delivered inside an AdmissionReview, which is
    /// always sent with 200.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::Transport(_) => StatusCode::BAD_REQUEST,
            AdmissionError::Validation(_) | AdmissionError::MalformedResource(_) => StatusCode::OK,
            AdmissionError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}
