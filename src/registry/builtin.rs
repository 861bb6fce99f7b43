use crate::cluster::ResourceKind;

/// Kind name of namespace records, always present in a registry
pub const NAMESPACE_KIND: &str = "Namespace";

const FLEET_GROUP: &str = "fleet.cattle.io";
const FLEET_VERSION: &str = "v1alpha1";

/// Kinds supported out of the box
pub fn builtin_kinds() -> Vec<ResourceKind> {
    vec![
        ResourceKind::cluster_scoped(NAMESPACE_KIND, "namespaces", "", "v1"),
        ResourceKind::namespaced("ConfigMap", "configmaps", "", "v1"),
        ResourceKind::namespaced("Secret", "secrets", "", "v1"),
        ResourceKind::namespaced("ServiceAccount", "serviceaccounts", "", "v1"),
        ResourceKind::namespaced("Service", "services", "", "v1"),
        ResourceKind::namespaced("Deployment", "deployments", "apps", "v1"),
        ResourceKind::namespaced("StatefulSet", "statefulsets", "apps", "v1"),
        ResourceKind::namespaced("DaemonSet", "daemonsets", "apps", "v1"),
        ResourceKind::namespaced("Ingress", "ingresses", "networking.k8s.io", "v1"),
        // Fleet
        ResourceKind::namespaced("GitRepo", "gitrepos", FLEET_GROUP, FLEET_VERSION),
        ResourceKind::namespaced("Bundle", "bundles", FLEET_GROUP, FLEET_VERSION),
        ResourceKind::namespaced("ClusterGroup", "clustergroups", FLEET_GROUP, FLEET_VERSION),
        ResourceKind::namespaced("Cluster", "clusters", FLEET_GROUP, FLEET_VERSION),
    ]
}
