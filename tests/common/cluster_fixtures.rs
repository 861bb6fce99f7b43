//! In-memory cluster fixtures

use std::sync::Arc;

use fleetsnap::cluster::memory::{ClusterCall, InMemoryCluster};
use fleetsnap::Registry;
use serde_json::json;

/// Two fleet workspaces holding a few fleet and core resources
pub fn fleet_cluster() -> InMemoryCluster {
    InMemoryCluster::new()
        .with_namespace("fleet-default")
        .with_namespace("fleet-local")
        .with_object(
            "GitRepo",
            Some("fleet-default"),
            json!({
                "metadata": {"name": "apps", "labels": {"team": "platform"}},
                "spec": {"repo": "https://git.example/apps", "branch": "main"}
            }),
        )
        .with_object(
            "ClusterGroup",
            Some("fleet-default"),
            json!({
                "metadata": {"name": "prod"},
                "spec": {"selector": {"matchLabels": {"env": "prod"}}}
            }),
        )
        .with_object(
            "ConfigMap",
            Some("fleet-local"),
            json!({"metadata": {"name": "settings"}, "data": {"mode": "fast"}}),
        )
        .with_object(
            "Secret",
            Some("fleet-local"),
            json!({"metadata": {"name": "creds"}, "type": "Opaque", "data": {"token": "czNjcjN0"}}),
        )
}

/// Registry with every built-in kind bound to `cluster`
pub fn registry_for(cluster: &Arc<InMemoryCluster>) -> Arc<Registry> {
    Arc::new(Registry::with_builtin_kinds(cluster.clone()))
}

/// Position of the first create or update call for `kind`
pub fn first_apply_of(calls: &[ClusterCall], kind: &str) -> Option<usize> {
    calls
        .iter()
        .position(|call| call.target().map(|(k, _)| k) == Some(kind))
}

/// Position of the last create or update call for `kind`
pub fn last_apply_of(calls: &[ClusterCall], kind: &str) -> Option<usize> {
    calls
        .iter()
        .rposition(|call| call.target().map(|(k, _)| k) == Some(kind))
}
