//! AdmissionReview decoding, evaluation and encoding.
//!
//! Transport failures (unreadable envelope, missing request) surface as
//! [`AdmissionError::Transport`]. Everything after a request has been
//! identified is answered with an AdmissionReview, including rejections.
//!
//! The embedded object is held back as raw JSON while the envelope is decoded,
//! so a broken Pod is denied against its request UID instead of failing the
//! whole review.

use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AdmissionError;
use crate::webhooks::patch::to_json_patch;
use crate::webhooks::rules::MutationEngine;

/// Kind routed into the mutation engine
pub const POD_KIND: &str = "Pod";

/// What happened to an admission request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Not a Pod, or nothing to inspect
    Skipped,
    /// Allowed without changes
    Allowed,
    /// Allowed with a JSON patch
    Patched,
    /// Rejected with `allowed: false`
    Denied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Allowed => "allowed",
            Outcome::Patched => "patched",
            Outcome::Denied => "denied",
        }
    }
}

/// Response for a request along with its outcome
#[derive(Debug)]
pub struct Reviewed {
    pub response: AdmissionResponse,
    pub outcome: Outcome,
    pub patch_count: usize,
}

impl Reviewed {
    fn new(response: AdmissionResponse, outcome: Outcome) -> Self {
        Self {
            response,
            outcome,
            patch_count: 0,
        }
    }
}

/// A decoded admission request with its object still in raw form
#[derive(Debug)]
pub struct DecodedReview {
    /// Request envelope; `object` and `oldObject` are always `None`
    pub request: AdmissionRequest<DynamicObject>,
    /// The `request.object` JSON as sent by the API server
    pub object: Option<Value>,
}

/// Decode an AdmissionReview body and extract its request
pub fn decode_review(body: &[u8]) -> Result<DecodedReview, AdmissionError> {
    let mut review: Value =
        serde_json::from_slice(body).map_err(|e| AdmissionError::Transport(e.to_string()))?;

    let mut object = None;
    if let Some(request) = review.get_mut("request").and_then(Value::as_object_mut) {
        object = request.remove("object").filter(|o| !o.is_null());
        request.remove("oldObject");
    }

    let review: AdmissionReview<DynamicObject> =
        serde_json::from_value(review).map_err(|e| AdmissionError::Transport(e.to_string()))?;
    let request: Result<AdmissionRequest<DynamicObject>, _> = review.try_into();
    let request = request.map_err(|e| AdmissionError::Transport(e.to_string()))?;
    Ok(DecodedReview { request, object })
}

/// Evaluate a request against the engine. Never fails: rejections become
/// `allowed: false` responses.
pub fn review_request(engine: &MutationEngine, review: &DecodedReview) -> Reviewed {
    let request = &review.request;
    let uid = &request.uid;
    debug!(
        uid = %uid,
        kind = %request.kind.kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    if request.kind.kind != POD_KIND || request.operation == Operation::Delete {
        debug!(uid = %uid, kind = %request.kind.kind, "Admission request skipped");
        return Reviewed::new(AdmissionResponse::from(request), Outcome::Skipped);
    }

    match mutate_pod(engine, request, review.object.as_ref()) {
        Ok(reviewed) => reviewed,
        Err(e) => {
            warn!(
                uid = %uid,
                namespace = ?request.namespace,
                name = %request.name,
                error = %e,
                "Admission request denied"
            );
            Reviewed::new(
                AdmissionResponse::from(request).deny(e.to_string()),
                Outcome::Denied,
            )
        }
    }
}

fn mutate_pod(
    engine: &MutationEngine,
    request: &AdmissionRequest<DynamicObject>,
    object: Option<&Value>,
) -> Result<Reviewed, AdmissionError> {
    let pod = decode_pod(object)?;
    let mutation = engine.decide(&pod)?;

    for warning in &mutation.warnings {
        warn!(
            uid = %request.uid,
            namespace = ?request.namespace,
            name = %request.name,
            "{}", warning
        );
    }

    let response = AdmissionResponse::from(request);
    if mutation.is_empty() {
        info!(uid = %request.uid, "Admission request allowed");
        return Ok(Reviewed::new(response, Outcome::Allowed));
    }

    let patch_count = mutation.patches.len();
    let patch = to_json_patch(&mutation.patches)
        .map_err(|e| AdmissionError::Encoding(e.to_string()))?;
    let response = response
        .with_patch(patch)
        .map_err(|e| AdmissionError::Encoding(e.to_string()))?;

    info!(
        uid = %request.uid,
        namespace = ?request.namespace,
        name = %request.name,
        patches = patch_count,
        "Admission request patched"
    );
    Ok(Reviewed {
        response,
        outcome: Outcome::Patched,
        patch_count,
    })
}

fn decode_pod(object: Option<&Value>) -> Result<Pod, AdmissionError> {
    let object =
        object.ok_or_else(|| AdmissionError::MalformedResource("missing object".to_string()))?;
    Pod::deserialize(object).map_err(|e| AdmissionError::MalformedResource(e.to_string()))
}

/// Serialize a response as an AdmissionReview body
pub fn encode_review(response: AdmissionResponse) -> Result<Vec<u8>, AdmissionError> {
    serde_json::to_vec(&response.into_review()).map_err(|e| AdmissionError::Encoding(e.to_string()))
}

/// Decode, evaluate and encode one AdmissionReview
pub fn handle_admission(engine: &MutationEngine, body: &[u8]) -> Result<Vec<u8>, AdmissionError> {
    let review = decode_review(body)?;
    encode_review(review_request(engine, &review).response)
}
