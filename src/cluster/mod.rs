//! Cluster access boundary
//!
//! The engine talks to the remote cluster only through [`ClusterAccess`]:
//! list, create, update and namespace enumeration. [`http::HttpCluster`]
//! speaks a Kubernetes-style REST API; [`memory::InMemoryCluster`] is a
//! deterministic stand-in used by tests.

mod error;
pub mod http;
mod kind;
pub mod memory;

pub use error::ClusterError;
pub use kind::ResourceKind;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Opaque resource document as produced by the cluster
pub type RawResource = Value;

/// Where a list operation looks for instances
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Cluster,
    Namespace(String),
}

impl Scope {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Scope::Cluster => None,
            Scope::Namespace(ns) => Some(ns),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Cluster => write!(f, "cluster scope"),
            Scope::Namespace(ns) => write!(f, "namespace {}", ns),
        }
    }
}

/// `metadata.name` of a resource document
pub fn object_name(resource: &RawResource) -> Option<&str> {
    resource
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

/// `metadata.namespace` of a resource document
pub fn object_namespace(resource: &RawResource) -> Option<&str> {
    resource
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .filter(|ns| !ns.is_empty())
}

/// Narrow contract the engine needs from a cluster
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    /// Names of every namespace in the cluster
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    /// All instances of `kind` within `scope`
    async fn list(&self, kind: &ResourceKind, scope: &Scope)
        -> Result<Vec<RawResource>, ClusterError>;

    /// Create a new instance
    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError>;

    /// Replace an existing instance; `ClusterError::NotFound` if it does not exist
    async fn update(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError>;

    /// Update, falling back to create only when the update reports not found.
    ///
    /// The two calls are not atomic: an instance deleted between them is
    /// recreated, and one created concurrently makes the create fail with
    /// `AlreadyExists`. Adapters with a native upsert should override this.
    async fn upsert(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError> {
        match self.update(kind, namespace, payload).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    kind = %kind,
                    namespace = namespace.unwrap_or("-"),
                    name = object_name(payload).unwrap_or("-"),
                    "Resource not found, creating"
                );
                self.create(kind, namespace, payload).await
            }
            other => other,
        }
    }
}
