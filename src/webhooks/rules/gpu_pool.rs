//! GPU pool assignment rule.
//!
//! A Pod annotated with `mrxrunway.ai/gpu.pool` is placed into the KAI
//! scheduler queue of the same name, and its first container gets an
//! `nvidia.com/gpu` limit taken from `mrxrunway.ai/gpu.count`.
//!
//! The count is passed through verbatim. Kubernetes validates it as a
//! quantity after admission.

use k8s_openapi::api::core::v1::Pod;
use serde_json::json;

use super::{Mutation, MutationRule, RuleError, annotation, label_patch};
use crate::webhooks::patch::{JsonPointer, PatchOperation};

/// Annotation naming the GPU pool
pub const GPU_POOL_ANNOTATION: &str = "mrxrunway.ai/gpu.pool";
/// Annotation carrying the GPU count, required alongside the pool
pub const GPU_COUNT_ANNOTATION: &str = "mrxrunway.ai/gpu.count";
/// KAI scheduler queue label
pub const QUEUE_LABEL: &str = "kai.scheduler/queue";
/// Extended resource name for NVIDIA GPUs
pub const GPU_RESOURCE: &str = "nvidia.com/gpu";

/// Assigns the KAI scheduler queue and GPU limit
#[derive(Clone, Copy, Debug, Default)]
pub struct GpuPoolRule;

impl MutationRule for GpuPoolRule {
    fn name(&self) -> &'static str {
        "gpu-pool"
    }

    fn matches(&self, pod: &Pod) -> bool {
        annotation(pod, GPU_POOL_ANNOTATION).is_some()
    }

    fn patches(&self, pod: &Pod) -> Result<Mutation, RuleError> {
        let Some(pool) = annotation(pod, GPU_POOL_ANNOTATION) else {
            return Ok(Mutation::new());
        };
        let count = annotation(pod, GPU_COUNT_ANNOTATION).ok_or(RuleError::MissingAnnotation {
            present: GPU_POOL_ANNOTATION,
            required: GPU_COUNT_ANNOTATION,
        })?;

        let mutation = Mutation::new().patch(label_patch(pod, QUEUE_LABEL, pool));

        Ok(match gpu_limit_patch(pod, count) {
            Some(op) => mutation.patch(op),
            None => mutation.warn("no containers found, skipping GPU resource limit"),
        })
    }
}

/// GPU limit on the first container, or `None` when there are no containers
fn gpu_limit_patch(pod: &Pod, count: &str) -> Option<PatchOperation> {
    let container = pod.spec.as_ref()?.containers.first()?;
    let resources_ptr = JsonPointer::root()
        .push("spec")
        .push("containers")
        .index(0)
        .push("resources");

    let op = match &container.resources {
        None => PatchOperation::add(
            resources_ptr,
            json!({ "limits": { GPU_RESOURCE: count } }),
        ),
        Some(resources) => {
            let limits_ptr = resources_ptr.push("limits");
            match resources.limits {
                None => PatchOperation::add(limits_ptr, json!({ GPU_RESOURCE: count })),
                Some(_) => PatchOperation::add(limits_ptr.push(GPU_RESOURCE), count),
            }
        }
    };
    Some(op)
}
