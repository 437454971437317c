//! Mutation rules for Pod admission requests.
//!
//! Each rule inspects a Pod and, when its trigger annotation is present,
//! produces JSON-Patch operations. The [`MutationEngine`] runs the registered
//! rules in order:
//! - [`gpu_pool::GpuPoolRule`]: KAI scheduler queue label + GPU limit
//! - [`label_injection::LabelInjectionRule`]: annotation pair -> label

pub mod gpu_pool;
pub mod label_injection;

use std::borrow::Cow;

use k8s_openapi::api::core::v1::Pod;
use serde_json::json;
use thiserror::Error;

use crate::webhooks::patch::{JsonPointer, PatchOperation, to_json_patch};

pub use gpu_pool::GpuPoolRule;
pub use label_injection::LabelInjectionRule;

/// Error returned when a rule rejects a Pod
#[derive(Error, Debug)]
pub enum RuleError {
    /// A trigger annotation is present without its required companion
    #[error("{present} annotation requires {required} annotation")]
    MissingAnnotation {
        present: &'static str,
        required: &'static str,
    },

    /// Patches from an earlier rule could not be applied to the working copy
    #[error("failed to apply patches from rule {rule}: {message}")]
    Patch { rule: &'static str, message: String },
}

/// Output of a rule (or of the whole engine)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Mutation {
    /// Patch operations, in emission order
    pub patches: Vec<PatchOperation>,
    /// Non-fatal conditions worth logging
    pub warnings: Vec<String>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch(mut self, op: PatchOperation) -> Self {
        self.patches.push(op);
        self
    }

    pub fn warn(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    fn extend(&mut self, other: Mutation) {
        self.patches.extend(other.patches);
        self.warnings.extend(other.warnings);
    }
}

/// An annotation-driven Pod mutator
pub trait MutationRule: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Whether the rule's trigger is present on the Pod
    fn matches(&self, pod: &Pod) -> bool;

    /// Patches for the Pod. Only called when [`MutationRule::matches`] is true.
    fn patches(&self, pod: &Pod) -> Result<Mutation, RuleError>;
}

/// Look up an annotation on a Pod
pub(crate) fn annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Add a label, creating the labels map when the Pod has none
pub(crate) fn label_patch(pod: &Pod, key: &str, value: &str) -> PatchOperation {
    let labels = JsonPointer::root().push("metadata").push("labels");
    match pod.metadata.labels {
        Some(_) => PatchOperation::add(labels.push(key), value),
        None => PatchOperation::add(labels, json!({ key: value })),
    }
}

/// Ordered table of mutation rules
pub struct MutationEngine {
    rules: Vec<Box<dyn MutationRule>>,
}

impl Default for MutationEngine {
    /// GPU pool assignment followed by the `inho=message` label rule
    fn default() -> Self {
        Self::new()
            .with_rule(GpuPoolRule)
            .with_rule(LabelInjectionRule::new("inho", "message", "inho", "hello"))
    }
}

impl MutationEngine {
    /// Create an engine with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule after those already registered
    pub fn with_rule(mut self, rule: impl MutationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the registered rules, in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Decide which patches apply to a Pod.
    ///
    /// Rules see the Pod as already mutated by earlier rules, so two rules that
    /// both add labels to a label-less Pod never both emit `add /metadata/labels`.
    pub fn decide(&self, pod: &Pod) -> Result<Mutation, RuleError> {
        let mut decision = Mutation::new();
        let mut current: Cow<'_, Pod> = Cow::Borrowed(pod);

        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.matches(&current) {
                continue;
            }

            let mutation = rule.patches(&current)?;
            let more_rules = idx + 1 < self.rules.len();
            if more_rules && !mutation.is_empty() {
                current = Cow::Owned(apply(&current, &mutation.patches, rule.name())?);
            }
            decision.extend(mutation);
        }

        Ok(decision)
    }
}

/// Apply patches to a copy of the Pod
fn apply(pod: &Pod, ops: &[PatchOperation], rule: &'static str) -> Result<Pod, RuleError> {
    let err = |message: String| RuleError::Patch { rule, message };

    let mut doc = serde_json::to_value(pod).map_err(|e| err(e.to_string()))?;
    let patch = to_json_patch(ops).map_err(|e| err(e.to_string()))?;
    json_patch::patch(&mut doc, &patch).map_err(|e| err(e.to_string()))?;
    serde_json::from_value(doc).map_err(|e| err(e.to_string()))
}
