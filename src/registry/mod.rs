//! Resource type registry
//!
//! Single dispatch table from kind name to the capabilities the engine needs:
//! listing within a scope, upserting a payload, and the directory name used
//! inside a snapshot. Supporting a new kind means adding one
//! [`ResourceKind`] entry; the collector and applier never branch on kinds.

mod builtin;

pub use builtin::{builtin_kinds, NAMESPACE_KIND};

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::cluster::{ClusterAccess, ClusterError, RawResource, ResourceKind, Scope};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unsupported kind: {0}")]
    UnsupportedKind(String),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Kind table bound to a cluster
pub struct Registry {
    kinds: BTreeMap<String, ResourceKind>,
    cluster: Arc<dyn ClusterAccess>,
}

impl Registry {
    /// Registry with only the namespace kind
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        let mut registry = Self {
            kinds: BTreeMap::new(),
            cluster,
        };
        if let Some(ns) = builtin_kinds()
            .into_iter()
            .find(|k| k.name == NAMESPACE_KIND)
        {
            registry.register(ns);
        }
        registry
    }

    /// Registry with every built-in kind
    pub fn with_builtin_kinds(cluster: Arc<dyn ClusterAccess>) -> Self {
        let mut registry = Self::new(cluster);
        for kind in builtin_kinds() {
            registry.register(kind);
        }
        registry
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: ResourceKind) -> &mut Self {
        self.kinds.insert(kind.name.to_lowercase(), kind);
        self
    }

    /// Keep only the named kinds (case-insensitive). The namespace kind is
    /// always kept since every restore depends on it.
    ///
    /// Returns the requested names that matched nothing.
    pub fn retain_kinds(&mut self, names: &[String]) -> Vec<String> {
        let wanted: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let unknown = names
            .iter()
            .filter(|n| !self.kinds.contains_key(&n.to_lowercase()))
            .cloned()
            .collect();
        let namespace_key = NAMESPACE_KIND.to_lowercase();
        self.kinds
            .retain(|key, _| *key == namespace_key || wanted.contains(key));
        unknown
    }

    /// Look up a kind by name
    pub fn lookup(&self, name: &str) -> Result<&ResourceKind, RegistryError> {
        self.kinds
            .get(&name.to_lowercase())
            .ok_or_else(|| RegistryError::UnsupportedKind(name.to_string()))
    }

    /// Snapshot directory name for a kind
    pub fn dir_name(&self, name: &str) -> Result<&str, RegistryError> {
        self.lookup(name).map(ResourceKind::dir_name)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds.values()
    }

    pub fn namespaced_kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds().filter(|k| !k.cluster_scoped)
    }

    pub fn cluster_scoped_kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds().filter(|k| k.cluster_scoped)
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterAccess> {
        &self.cluster
    }

    /// List every instance of `kind` within `scope`
    pub async fn list(&self, kind: &str, scope: &Scope) -> Result<Vec<RawResource>, RegistryError> {
        let kind = self.lookup(kind)?;
        let cluster_scope = Scope::Cluster;
        let scope = if kind.cluster_scoped {
            &cluster_scope
        } else {
            scope
        };
        Ok(self.cluster.list(kind, scope).await?)
    }

    /// Update the instance, creating it only if the update reports not found
    pub async fn upsert(
        &self,
        kind: &str,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, RegistryError> {
        let kind = self.lookup(kind)?;
        let namespace = if kind.cluster_scoped { None } else { namespace };
        Ok(self.cluster.upsert(kind, namespace, payload).await?)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}
