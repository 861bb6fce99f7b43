use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::{object_name, object_namespace, RawResource, ResourceKind};

/// Wrapped form of one resource instance inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: String,
    pub resource: RawResource,
}

impl ResourceRecord {
    pub fn new(kind: impl Into<String>, resource: RawResource) -> Self {
        Self {
            kind: kind.into(),
            resource,
        }
    }

    /// Pretty-printed JSON bytes as written to disk
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parse a snapshot file; both `kind` and `resource` must be present
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn name(&self) -> Option<&str> {
        object_name(&self.resource)
    }

    pub fn namespace(&self) -> Option<&str> {
        object_namespace(&self.resource)
    }
}

/// Identifies one resource instance; cluster-scoped kinds carry no namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.map(String::from),
            name: name.into(),
        }
    }

    /// Identity of `resource` as an instance of `kind`.
    ///
    /// `name` is always required; `namespace` is required unless the kind is
    /// cluster-scoped, in which case any namespace on the document is ignored.
    /// The error is a human readable reason.
    pub fn resolve(kind: &ResourceKind, resource: &RawResource) -> Result<Self, String> {
        let name = object_name(resource).ok_or_else(|| "metadata.name is missing".to_string())?;
        let namespace = if kind.cluster_scoped {
            None
        } else {
            Some(
                object_namespace(resource)
                    .ok_or_else(|| "metadata.namespace is missing".to_string())?,
            )
        };
        Ok(Self::new(kind.name.clone(), namespace, name))
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
