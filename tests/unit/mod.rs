// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for gpu-pool-webhook.
//!
//! These tests run without a Kubernetes cluster and exercise the public
//! decision engine and AdmissionReview adapter.

#[path = "../common/mod.rs"]
mod common;

mod engine_tests {
    use crate::common::fixtures::*;
    use gpu_pool_webhook::webhooks::{MutationEngine, PatchOperation, RuleError};
    use serde_json::json;

    #[test]
    fn test_pod_without_annotations_is_untouched() {
        let pod = PodBuilder::new("plain").container("main").build();
        let decision = MutationEngine::default().decide(&pod).unwrap();
        assert!(decision.patches.is_empty());
        assert!(decision.warnings.is_empty());
    }

    #[test]
    fn test_pool_without_count_fails() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "team-a")
            .container("main")
            .build();
        let err = MutationEngine::default().decide(&pod).unwrap_err();
        assert!(matches!(err, RuleError::MissingAnnotation { .. }));
    }

    #[test]
    fn test_fresh_pod_gets_two_patches() {
        let decision = MutationEngine::default()
            .decide(&gpu_pod("X", "N"))
            .unwrap();
        assert_eq!(
            decision.patches,
            vec![
                PatchOperation::add("/metadata/labels", json!({"kai.scheduler/queue": "X"})),
                PatchOperation::add(
                    "/spec/containers/0/resources/limits",
                    json!({"nvidia.com/gpu": "N"})
                ),
            ]
        );
    }

    #[test]
    fn test_existing_maps_use_escaped_paths() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "X")
            .annotation(COUNT, "N")
            .label("a", "b")
            .container_with_limits("main", &[("cpu", "1")])
            .build();
        let decision = MutationEngine::default().decide(&pod).unwrap();
        let paths: Vec<_> = decision.patches.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/metadata/labels/kai.scheduler~1queue",
                "/spec/containers/0/resources/limits/nvidia.com~1gpu",
            ]
        );
    }

    #[test]
    fn test_zero_containers_label_only() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "X")
            .annotation(COUNT, "1")
            .build();
        let decision = MutationEngine::default().decide(&pod).unwrap();
        assert_eq!(decision.patches.len(), 1);
        assert_eq!(decision.patches[0].path, "/metadata/labels");
        assert!(!decision.warnings.is_empty());
    }

    #[test]
    fn test_patches_apply_to_expected_values() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "team-a")
            .annotation(COUNT, "8")
            .label("app", "trainer")
            .container_with_limits("main", &[("cpu", "4")])
            .container("sidecar")
            .build();
        let decision = MutationEngine::default().decide(&pod).unwrap();
        let mutated = apply_patches(&pod, &decision.patches).unwrap();

        assert_eq!(label(&mutated, "kai.scheduler/queue"), Some("team-a"));
        assert_eq!(label(&mutated, "app"), Some("trainer"));
        assert_eq!(gpu_limit(&mutated), Some("8".to_string()));

        let limits = mutated.spec.as_ref().unwrap().containers[0]
            .resources
            .as_ref()
            .unwrap()
            .limits
            .as_ref()
            .unwrap();
        assert_eq!(limits.get("cpu").map(|q| q.0.as_str()), Some("4"));
        assert!(
            mutated.spec.as_ref().unwrap().containers[1]
                .resources
                .as_ref()
                .unwrap()
                .limits
                .is_none()
        );
    }

    #[test]
    fn test_second_pass_routes_through_present_branch() {
        let engine = MutationEngine::default();
        let pod = gpu_pod("team-a", "2");

        let first = engine.decide(&pod).unwrap();
        let once = apply_patches(&pod, &first.patches).unwrap();

        let second = engine.decide(&once).unwrap();
        assert_eq!(second.patches[0].path, "/metadata/labels/kai.scheduler~1queue");
        assert_eq!(
            second.patches[1].path,
            "/spec/containers/0/resources/limits/nvidia.com~1gpu"
        );

        let twice = apply_patches(&once, &second.patches).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_both_rules_on_labelless_pod() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "team-a")
            .annotation(COUNT, "1")
            .annotation("inho", "message")
            .container("main")
            .build();
        let decision = MutationEngine::default().decide(&pod).unwrap();
        let label_map_adds = decision
            .patches
            .iter()
            .filter(|p| p.path == "/metadata/labels")
            .count();
        assert_eq!(label_map_adds, 1);

        let mutated = apply_patches(&pod, &decision.patches).unwrap();
        assert_eq!(label(&mutated, "kai.scheduler/queue"), Some("team-a"));
        assert_eq!(label(&mutated, "inho"), Some("hello"));
    }
}

mod adapter_tests {
    use crate::common::fixtures::*;
    use gpu_pool_webhook::AdmissionError;
    use gpu_pool_webhook::webhooks::{MutationEngine, handle_admission};
    use serde_json::{Value, json};

    fn handle(body: &[u8]) -> Result<Value, AdmissionError> {
        handle_admission(&MutationEngine::default(), body)
            .map(|out| serde_json::from_slice(&out).unwrap())
    }

    #[test]
    fn test_patched_response() {
        let review = handle(&pod_review("uid-1", &gpu_pod("team-a", "1"))).unwrap();
        assert_eq!(review["response"]["uid"], "uid-1");
        assert_eq!(review["response"]["allowed"], true);
        assert_eq!(review["response"]["patchType"], "JSONPatch");
    }

    #[test]
    fn test_untouched_pod_has_no_patch() {
        let pod = PodBuilder::new("plain").container("main").build();
        let review = handle(&pod_review("uid-2", &pod)).unwrap();
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
        assert!(review["response"].get("patchType").is_none());
    }

    #[test]
    fn test_validation_error_is_semantic_rejection() {
        let pod = PodBuilder::new("trainer")
            .annotation(POOL, "team-a")
            .container("main")
            .build();
        let review = handle(&pod_review("uid-3", &pod)).unwrap();
        assert_eq!(review["response"]["uid"], "uid-3");
        assert_eq!(review["response"]["allowed"], false);
        assert!(
            review["response"]["status"]["message"]
                .as_str()
                .unwrap()
                .contains("mrxrunway.ai/gpu.count")
        );
    }

    #[test]
    fn test_non_pod_kind_passes_through() {
        let object = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "annotations": {POOL: "team-a"}},
        });
        let body = serde_json::to_vec(&review_json("uid-4", "Deployment", object)).unwrap();
        let review = handle(&body).unwrap();
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
    }

    #[test]
    fn test_transport_errors() {
        let err = handle(b"").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = handle(br#"{"kind":"AdmissionReview","apiVersion":"admission.k8s.io/v1"}"#)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Transport(_)));
    }
}
