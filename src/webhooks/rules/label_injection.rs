//! Annotation-to-label rule.
//!
//! When a Pod carries `annotation_key: annotation_value`, the label
//! `label_key: label_value` is added.

use k8s_openapi::api::core::v1::Pod;

use super::{Mutation, MutationRule, RuleError, annotation, label_patch};

/// Adds a fixed label when a fixed annotation pair is present
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelInjectionRule {
    pub annotation_key: String,
    pub annotation_value: String,
    pub label_key: String,
    pub label_value: String,
}

impl LabelInjectionRule {
    pub fn new(
        annotation_key: impl Into<String>,
        annotation_value: impl Into<String>,
        label_key: impl Into<String>,
        label_value: impl Into<String>,
    ) -> Self {
        Self {
            annotation_key: annotation_key.into(),
            annotation_value: annotation_value.into(),
            label_key: label_key.into(),
            label_value: label_value.into(),
        }
    }
}

impl MutationRule for LabelInjectionRule {
    fn name(&self) -> &'static str {
        "label-injection"
    }

    fn matches(&self, pod: &Pod) -> bool {
        annotation(pod, &self.annotation_key) == Some(self.annotation_value.as_str())
    }

    fn patches(&self, pod: &Pod) -> Result<Mutation, RuleError> {
        Ok(Mutation::new().patch(label_patch(pod, &self.label_key, &self.label_value)))
    }
}
