use policy_runner_core::{
    k8s::{DynamicObject, GroupVersionKind, ObjectList, Snapshot},
    Evaluator, Incident, PolicySet,
};
use policy_runner_policies::{BestPractices, RegoEngine, Registry};
use pretty_assertions::assert_eq;
use serde_json::json;

fn policy_set() -> PolicySet {
    PolicySet {
        name: "bestpractices".to_string(),
        path: format!("{}/tests/fixtures/ocp", env!("CARGO_MANIFEST_DIR")),
        exclude_substrings: vec!["_test.rego".to_string()],
        query: "data.ocp.bestpractices".to_string(),
        severity: Some("warning".to_string()),
    }
}

fn object(value: serde_json::Value) -> DynamicObject {
    serde_json::from_value(value).expect("object must parse")
}

fn snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.push(
        "default",
        ObjectList::new(
            GroupVersionKind::gvk("apps", "v1", "Deployment"),
            vec![object(json!({
                "metadata": { "name": "web", "namespace": "default" },
                "spec": { "template": { "spec": { "containers": [
                    { "name": "nginx", "image": "nginx:latest" },
                ] } } },
            }))],
        ),
    );
    snapshot.push(
        "default",
        ObjectList::new(
            GroupVersionKind::gvk("", "v1", "Pod"),
            vec![
                object(json!({
                    "metadata": { "name": "api", "namespace": "default" },
                    "spec": { "containers": [{
                        "name": "api",
                        "image": "quay.io/shop/api:1.4.2",
                        "resources": { "limits": { "memory": "256Mi" } },
                    }] },
                })),
                object(json!({
                    "metadata": { "name": "worker", "namespace": "default" },
                    "spec": { "containers": [{
                        "name": "worker",
                        "image": "busybox:latest",
                        "resources": { "limits": { "memory": "64Mi" } },
                    }] },
                })),
            ],
        ),
    );
    snapshot
}

fn incident(message: &str, name: &str, group: &str, kind: &str) -> Incident {
    Incident {
        message: message.to_string(),
        namespace: "default".to_string(),
        name: name.to_string(),
        group: group.to_string(),
        version: "v1".to_string(),
        kind: kind.to_string(),
    }
}

#[test]
fn reports_violations_by_rule() {
    let mut evaluator =
        BestPractices::new(&RegoEngine::new(), &policy_set()).expect("policies must compile");
    assert_eq!(evaluator.policy_set(), "bestpractices");

    let evaluation = evaluator.evaluate(&snapshot());
    assert!(evaluation.is_complete(), "{:?}", evaluation.error);

    let issues = evaluation.issues;
    assert_eq!(
        issues.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        vec![
            "container_image_latest",
            "container_resources_limits_memory_notset"
        ]
    );

    assert_eq!(issues[0].id, "RHCOP-OCP_BESTPRACT-00005");
    assert_eq!(issues[0].severity.as_deref(), Some("warning"));
    assert_eq!(
        issues[0].incidents,
        vec![
            incident(
                "Deployment/web: container 'nginx' is using the latest tag for its image (nginx:latest), which is an anti-pattern.",
                "web",
                "apps",
                "Deployment",
            ),
            incident(
                "Pod/worker: container 'worker' is using the latest tag for its image (busybox:latest), which is an anti-pattern.",
                "worker",
                "",
                "Pod",
            ),
        ]
    );

    assert_eq!(issues[1].id, "RHCOP-OCP_BESTPRACT-00004");
    assert_eq!(
        issues[1].incidents,
        vec![incident(
            "Deployment/web: container 'nginx' has no memory limit",
            "web",
            "apps",
            "Deployment",
        )]
    );
}

#[test]
fn registry_runs_registered_policy_sets() {
    let mut registry = Registry::new();
    registry
        .register_policy_set(&policy_set())
        .expect("policies must compile");
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["bestpractices"]);

    let evaluation = registry.evaluate_all(&snapshot());
    assert!(evaluation.is_complete(), "{:?}", evaluation.error);
    assert_eq!(evaluation.issues.len(), 2);
    assert!(evaluation
        .issues
        .iter()
        .all(|issue| issue.policy_set == "bestpractices"));
}

#[test]
fn clean_objects_produce_no_issues() {
    let mut evaluator =
        BestPractices::new(&RegoEngine::new(), &policy_set()).expect("policies must compile");
    let mut snapshot = Snapshot::new();
    snapshot.push(
        "default",
        ObjectList::new(
            GroupVersionKind::gvk("", "v1", "ConfigMap"),
            vec![object(json!({
                "metadata": { "name": "settings", "namespace": "default" },
                "data": { "LOG_LEVEL": "info" },
            }))],
        ),
    );

    let evaluation = evaluator.evaluate(&snapshot);
    assert!(evaluation.is_complete(), "{:?}", evaluation.error);
    assert!(evaluation.issues.is_empty());
}
