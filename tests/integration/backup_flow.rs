//! Integration tests for the backup collector and backup → restore round trip

use std::sync::Arc;

use super::common::cluster_fixtures::{fleet_cluster, registry_for};
use super::common::snapshot_fixtures::{read_record, TestSnapshot};
use fleetsnap::cluster::memory::InMemoryCluster;
use fleetsnap::snapshot::SERVER_ASSIGNED_FIELDS;
use fleetsnap::{BackupCollector, Config, FleetCore, RestoreApplier, RunOptions, SnapshotTree};
use tokio_util::sync::CancellationToken;

/// Test that a backup writes one file per instance in the documented layout
#[tokio::test]
async fn test_backup_layout() {
    let snapshot = TestSnapshot::new();
    let cluster = Arc::new(fleet_cluster());
    let collector = BackupCollector::new(registry_for(&cluster), RunOptions::new(&snapshot.path));

    let summary = collector
        .perform_backup(CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.has_failures(), "{summary}");
    assert_eq!(summary.namespaces, 2);
    assert_eq!(summary.total, 6);
    assert_eq!(summary.per_kind.get("Namespace"), Some(&2));
    assert_eq!(summary.per_kind.get("GitRepo"), Some(&1));

    let repo = snapshot.read("fleet-default/gitrepos/apps.json");
    assert_eq!(repo.kind, "GitRepo");
    assert_eq!(repo.resource["spec"]["branch"], "main");
    // Backups keep the document exactly as listed
    assert!(repo.resource.pointer("/metadata/resourceVersion").is_some());

    let namespace = snapshot.read("namespaces/fleet-local.json");
    assert_eq!(namespace.kind, "Namespace");

    let files = SnapshotTree::new(&snapshot.path).scan().unwrap();
    assert_eq!(files.namespaces.len(), 2);
    assert_eq!(files.others.len(), 4);
}

/// Test that restoring a backup into an empty cluster recreates every object
#[tokio::test]
async fn test_backup_then_restore_round_trip() {
    let snapshot = TestSnapshot::new();
    let source = Arc::new(fleet_cluster());
    BackupCollector::new(registry_for(&source), RunOptions::new(&snapshot.path))
        .perform_backup(CancellationToken::new())
        .await
        .unwrap();

    let target = Arc::new(InMemoryCluster::new());
    let summary = RestoreApplier::new(registry_for(&target), RunOptions::new(&snapshot.path))
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.has_failures(), "{summary}");
    assert_eq!(summary.total, 6);
    assert_eq!(target.object_count(), source.object_count());

    let original = source.object("GitRepo", Some("fleet-default"), "apps").unwrap();
    let restored = target.object("GitRepo", Some("fleet-default"), "apps").unwrap();
    assert_eq!(restored["spec"], original["spec"]);
    assert_eq!(restored["metadata"]["labels"], original["metadata"]["labels"]);
    // Server-assigned fields come from the target cluster, not the snapshot
    assert_ne!(restored["metadata"]["uid"], original["metadata"]["uid"]);

    let secret = target.object("Secret", Some("fleet-local"), "creds").unwrap();
    assert_eq!(secret["data"]["token"], "czNjcjN0");
}

/// Test that a restored document never carries the snapshot's server fields
#[tokio::test]
async fn test_restore_payload_is_sanitized() {
    let snapshot = TestSnapshot::new();
    let source = Arc::new(fleet_cluster());
    BackupCollector::new(registry_for(&source), RunOptions::new(&snapshot.path))
        .perform_backup(CancellationToken::new())
        .await
        .unwrap();

    let on_disk = read_record(&snapshot.path.join("fleet-local/configmaps/settings.json"));
    let stale_uid = on_disk.resource["metadata"]["uid"].clone();
    assert!(!stale_uid.is_null());

    // Restoring over the source cluster updates in place; a stale
    // resourceVersion would be rejected with a conflict
    let summary = RestoreApplier::new(registry_for(&source), RunOptions::new(&snapshot.path))
        .perform_restore(CancellationToken::new())
        .await
        .unwrap();
    assert!(!summary.has_failures(), "{summary}");

    let live = source.object("ConfigMap", Some("fleet-local"), "settings").unwrap();
    assert_eq!(live["metadata"]["uid"], stale_uid);
    for field in ["managedFields", "generation", "selfLink"] {
        assert!(SERVER_ASSIGNED_FIELDS.contains(&field));
        assert!(live["metadata"].get(field).is_none(), "{field} leaked");
    }
}

/// Test that the kind allow-list limits what a backup touches
#[tokio::test]
async fn test_kind_allow_list_limits_backup() {
    let snapshot = TestSnapshot::new();
    let config = Config {
        backup_dir: snapshot.path.clone(),
        kinds: Some(vec!["GitRepo".to_string()]),
        ..Config::default()
    };
    let core = FleetCore::new(config, Arc::new(fleet_cluster()));

    let summary = core
        .backup_collector()
        .perform_backup(CancellationToken::new())
        .await
        .unwrap();

    let kinds: Vec<_> = summary.per_kind.keys().cloned().collect();
    assert_eq!(kinds, vec!["GitRepo".to_string(), "Namespace".to_string()]);
    // 1 namespace listing + 2 namespaces x 1 kind
    assert_eq!(summary.report.admitted, 3);
    assert!(!snapshot.path.join("fleet-local/configmaps").exists());
}
