//! Mutating admission webhook for Pods.
//!
//! - [`patch`]: JSON-Patch operations and JSON-Pointer escaping
//! - [`rules`]: annotation-driven mutation rules and the engine that runs them
//! - [`review`]: AdmissionReview decode / evaluate / encode
//! - [`server`]: HTTPS listener and routes

pub mod patch;
pub mod review;
pub mod rules;
mod server;

pub use patch::{JsonPointer, PatchOp, PatchOperation, escape_token};
pub use review::{DecodedReview, Outcome, Reviewed, handle_admission};
pub use rules::{
    GpuPoolRule, LabelInjectionRule, Mutation, MutationEngine, MutationRule, RuleError,
};
pub use server::{WebhookState, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
