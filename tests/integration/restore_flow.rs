//! Integration tests for the two-wave restore

use std::sync::Arc;
use std::time::Duration;

use super::common::cluster_fixtures::{first_apply_of, last_apply_of, registry_for};
use super::common::snapshot_fixtures::TestSnapshot;
use fleetsnap::cluster::memory::{ClusterCall, InMemoryCluster};
use fleetsnap::{OrchestrationError, ResourceError, RestoreApplier, RunOptions};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn two_namespaces_and_a_deployment() -> TestSnapshot {
    let snapshot = TestSnapshot::new();
    snapshot
        .write(
            "namespaces/alpha.json",
            "Namespace",
            json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "alpha"}}),
        )
        .write(
            "namespaces/beta.json",
            "Namespace",
            json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "beta"}}),
        )
        .write(
            "beta/deployments/web.json",
            "Deployment",
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {
                    "name": "web",
                    "namespace": "beta",
                    "resourceVersion": "77",
                    "uid": "3f0c",
                    "creationTimestamp": "2023-05-01T10:00:00Z"
                },
                "spec": {"replicas": 3}
            }),
        );
    snapshot
}

fn applier(cluster: &Arc<InMemoryCluster>, snapshot: &TestSnapshot) -> RestoreApplier {
    RestoreApplier::new(registry_for(cluster), RunOptions::new(&snapshot.path))
}

/// Test that both namespaces are applied before the deployment
#[tokio::test]
async fn test_namespaces_are_restored_first() {
    let snapshot = two_namespaces_and_a_deployment();
    let cluster = Arc::new(InMemoryCluster::new().with_delay(Duration::from_millis(5)));

    let summary = applier(&cluster, &snapshot)
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.has_failures(), "{summary}");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.files, 3);
    assert_eq!(summary.namespace_wave.succeeded, 2);
    assert_eq!(summary.other_wave.succeeded, 1);

    let calls = cluster.calls();
    let last_namespace = last_apply_of(&calls, "Namespace").unwrap();
    let first_deployment = first_apply_of(&calls, "Deployment").unwrap();
    assert!(last_namespace < first_deployment, "{calls:?}");

    let web = cluster.object("Deployment", Some("beta"), "web").unwrap();
    assert_eq!(web["spec"]["replicas"], 3);
    assert_ne!(web["metadata"]["uid"], "3f0c");
}

/// Test that a failed namespace still finishes before the second wave starts
#[tokio::test]
async fn test_failed_namespace_still_precedes_second_wave() {
    let snapshot = two_namespaces_and_a_deployment();
    let cluster = Arc::new(
        InMemoryCluster::new()
            .with_delay(Duration::from_millis(20))
            .failing_apply("Namespace", "alpha"),
    );

    let summary = applier(&cluster, &snapshot)
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.namespace_wave.errors.len(), 1);
    assert_eq!(summary.namespace_wave.errors[0].category(), "apply");
    assert!(summary.namespace_wave.errors[0]
        .to_string()
        .contains("Namespace alpha"));
    assert_eq!(summary.namespace_wave.succeeded, 1);
    assert!(summary.other_wave.is_clean());
    assert_eq!(summary.other_wave.succeeded, 1);

    let calls = cluster.calls();
    let failed_namespace = calls
        .iter()
        .position(|call| call.target() == Some(("Namespace", "alpha")))
        .unwrap();
    let first_deployment = first_apply_of(&calls, "Deployment").unwrap();
    assert!(failed_namespace < first_deployment, "{calls:?}");
    assert!(last_apply_of(&calls, "Namespace").unwrap() < first_deployment);
    assert!(cluster.object("Namespace", None, "alpha").is_none());
    assert!(cluster.object("Deployment", Some("beta"), "web").is_some());
}

/// Test that a second restore updates instead of duplicating
#[tokio::test]
async fn test_second_restore_updates_in_place() {
    let snapshot = two_namespaces_and_a_deployment();
    let cluster = Arc::new(InMemoryCluster::new());

    applier(&cluster, &snapshot)
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();
    let first = cluster.object("Deployment", Some("beta"), "web").unwrap();

    let calls_before = cluster.calls().len();
    let summary = applier(&cluster, &snapshot)
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();
    assert!(!summary.has_failures(), "{summary}");

    let second_run: Vec<_> = cluster.calls().into_iter().skip(calls_before).collect();
    assert_eq!(second_run.len(), 3);
    assert!(second_run
        .iter()
        .all(|call| matches!(call, ClusterCall::Update { .. })));

    let second = cluster.object("Deployment", Some("beta"), "web").unwrap();
    assert_eq!(cluster.object_count(), 3);
    assert_eq!(second["metadata"]["uid"], first["metadata"]["uid"]);
    assert_eq!(second["spec"], first["spec"]);
}

/// Test that bad files are reported individually while good files still apply
#[tokio::test]
async fn test_per_file_errors_are_aggregated() {
    let snapshot = two_namespaces_and_a_deployment();
    snapshot
        .write_raw("beta/configmaps/truncated.json", br#"{"kind": "ConfigMap", "resou"#)
        .write(
            "beta/gadgets/g.json",
            "Gadget",
            json!({"metadata": {"name": "g", "namespace": "beta"}}),
        )
        .write(
            "beta/services/nameless.json",
            "Service",
            json!({"metadata": {"namespace": "beta"}}),
        )
        .write("orphans/configmaps/loose.json", "ConfigMap", json!({"metadata": {"name": "loose"}}))
        .write_raw("beta/notes.txt", b"not a record");
    let cluster = Arc::new(InMemoryCluster::new().failing_apply("Deployment", "web"));

    let summary = applier(&cluster, &snapshot)
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.namespace_wave.is_clean());
    assert_eq!(summary.files, 7);
    assert_eq!(summary.other_wave.errors.len(), 5);

    let mut categories: Vec<_> = summary.errors().map(ResourceError::category).collect();
    categories.sort();
    assert_eq!(
        categories,
        vec!["apply", "decode", "unsupported-kind", "validation", "validation"]
    );

    for err in summary.errors() {
        let message = err.to_string();
        assert!(message.contains(snapshot.path.to_str().unwrap()), "{message}");
    }
    assert_eq!(summary.total, 2);
}

/// Test that a missing snapshot root aborts before touching the cluster
#[tokio::test]
async fn test_missing_root_aborts() {
    let snapshot = TestSnapshot::new();
    let cluster = Arc::new(InMemoryCluster::new());
    let applier = RestoreApplier::new(
        registry_for(&cluster),
        RunOptions::new(snapshot.path.join("nope")),
    );

    let err = applier
        .perform_restore(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::MissingSnapshotRoot(_)));
    assert!(err.to_string().contains("nope"));
    assert!(cluster.calls().is_empty());
}

/// Test that cancelling during the namespace wave drops the rest of the run
#[tokio::test]
async fn test_cancel_during_namespace_wave() {
    let snapshot = two_namespaces_and_a_deployment();
    snapshot.write(
        "namespaces/gamma.json",
        "Namespace",
        json!({"metadata": {"name": "gamma"}}),
    );
    let cluster = Arc::new(InMemoryCluster::new().with_delay(Duration::from_millis(500)));
    let applier = RestoreApplier::new(
        registry_for(&cluster),
        RunOptions::new(&snapshot.path).with_max_concurrency(1),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let summary = applier.perform_restore(cancel).await.unwrap();

    assert_eq!(summary.namespace_wave.admitted, 3);
    assert_eq!(summary.namespace_wave.errors.len(), 1);
    assert!(summary.namespace_wave.errors[0].is_cancelled());
    assert_eq!(summary.namespace_wave.dropped, 2);
    assert_eq!(summary.other_wave.admitted, 1);
    assert_eq!(summary.other_wave.dropped, 1);
    assert_eq!(summary.total, 0);
    assert_eq!(cluster.object_count(), 0);
}

/// Test that a dry run validates every file but applies nothing
#[tokio::test]
async fn test_dry_run_counts_without_applying() {
    let snapshot = two_namespaces_and_a_deployment();
    let cluster = Arc::new(InMemoryCluster::new());
    let applier = RestoreApplier::new(
        registry_for(&cluster),
        RunOptions::new(&snapshot.path).with_dry_run(true),
    );

    let summary = applier
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.total, 3);
    assert!(cluster.calls().is_empty());
    assert!(summary.to_string().starts_with("Would restore 3 of 3 resources"));
}
