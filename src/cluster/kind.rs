use std::fmt;

/// Descriptor of a resource kind the engine knows how to back up and restore.
///
/// Carries the API coordinates an adapter needs to address the kind and the
/// plural name used both in API paths and in snapshot directory names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKind {
    /// Kind name as it appears in documents (e.g. `Deployment`)
    pub name: String,
    /// Lowercase plural (e.g. `deployments`)
    pub plural: String,
    /// API group; empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Whether instances live outside any namespace
    pub cluster_scoped: bool,
}

impl ResourceKind {
    /// Describe a namespace-scoped kind
    pub fn namespaced(name: &str, plural: &str, group: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            plural: plural.to_lowercase(),
            group: group.to_string(),
            version: version.to_string(),
            cluster_scoped: false,
        }
    }

    /// Describe a cluster-scoped kind
    pub fn cluster_scoped(name: &str, plural: &str, group: &str, version: &str) -> Self {
        Self {
            cluster_scoped: true,
            ..Self::namespaced(name, plural, group, version)
        }
    }

    /// `apiVersion` value for documents of this kind (`v1`, `apps/v1`, ...)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Directory name used inside a snapshot
    pub fn dir_name(&self) -> &str {
        &self.plural
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
