//! In-memory cluster for deterministic testing
//!
//! Implements [`ClusterAccess`] over a map of documents. It assigns the same
//! kind of server-side metadata a real API server does (uid, resourceVersion,
//! creationTimestamp), rejects stale resourceVersions, refuses to create
//! namespaced objects in missing namespaces, and records every call so tests
//! can assert on ordering.
//!
//! # Example
//! ```no_run
//! use fleetsnap::cluster::memory::InMemoryCluster;
//! use serde_json::json;
//!
//! let cluster = InMemoryCluster::new()
//!     .with_namespace("default")
//!     .with_object("ConfigMap", Some("default"), json!({"metadata": {"name": "settings"}}));
//! assert_eq!(cluster.object_count(), 2);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{object_name, ClusterAccess, ClusterError, RawResource, ResourceKind, Scope};

const NAMESPACE_KIND: &str = "Namespace";
const CREATION_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// A call observed by the in-memory cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListNamespaces,
    List {
        kind: String,
        scope: Scope,
    },
    Create {
        kind: String,
        namespace: Option<String>,
        name: String,
    },
    Update {
        kind: String,
        namespace: Option<String>,
        name: String,
    },
}

impl ClusterCall {
    /// Kind and name for create/update calls
    pub fn target(&self) -> Option<(&str, &str)> {
        match self {
            ClusterCall::Create { kind, name, .. } | ClusterCall::Update { kind, name, .. } => {
                Some((kind, name))
            }
            _ => None,
        }
    }
}

type ObjectKey = (String, Option<String>, String);

/// In-memory [`ClusterAccess`] implementation
pub struct InMemoryCluster {
    objects: Mutex<BTreeMap<ObjectKey, RawResource>>,
    calls: Mutex<Vec<ClusterCall>>,
    revision: AtomicU64,
    delay: Duration,
    fail_namespaces: bool,
    list_failures: HashSet<(String, Scope)>,
    apply_failures: HashSet<(String, String)>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            revision: AtomicU64::new(1),
            delay: Duration::ZERO,
            fail_namespaces: false,
            list_failures: HashSet::new(),
            apply_failures: HashSet::new(),
        }
    }

    /// Seed a namespace object
    pub fn with_namespace(self, name: &str) -> Self {
        self.with_object(NAMESPACE_KIND, None, json!({ "metadata": { "name": name } }))
    }

    /// Seed an object, stamping it with server-assigned metadata
    pub fn with_object(self, kind: &str, namespace: Option<&str>, mut doc: Value) -> Self {
        let name = object_name(&doc).unwrap_or_default().to_string();
        if let Some(meta) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
            if let Some(ns) = namespace {
                meta.insert("namespace".into(), json!(ns));
            }
        }
        if let Some(obj) = doc.as_object_mut() {
            obj.entry("kind").or_insert_with(|| json!(kind));
        }
        self.stamp_created(&mut doc);
        self.objects
            .lock()
            .insert((kind.to_string(), namespace.map(String::from), name), doc);
        self
    }

    /// Sleep this long before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make namespace enumeration fail
    pub fn failing_namespaces(mut self) -> Self {
        self.fail_namespaces = true;
        self
    }

    /// Make listing `kind` in `scope` fail
    pub fn failing_list(mut self, kind: &str, scope: Scope) -> Self {
        self.list_failures.insert((kind.to_string(), scope));
        self
    }

    /// Make create and update of `kind`/`name` fail once the call is recorded
    pub fn failing_apply(mut self, kind: &str, name: &str) -> Self {
        self.apply_failures
            .insert((kind.to_string(), name.to_string()));
        self
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().clone()
    }

    /// Stored document for an object
    pub fn object(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<RawResource> {
        self.objects
            .lock()
            .get(&(
                kind.to_string(),
                namespace.map(String::from),
                name.to_string(),
            ))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst)
    }

    fn stamp_created(&self, doc: &mut Value) {
        let rev = self.next_revision();
        if let Some(meta) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("uid".into(), json!(Uuid::new_v4().to_string()));
            meta.insert("resourceVersion".into(), json!(rev.to_string()));
            meta.insert("creationTimestamp".into(), json!(CREATION_TIMESTAMP));
            meta.insert(
                "managedFields".into(),
                json!([{ "manager": "in-memory", "operation": "Update" }]),
            );
        }
    }

    async fn pause(&self) {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn record(&self, call: ClusterCall) {
        self.calls.lock().push(call);
    }

    fn check_apply(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<ObjectKey, ClusterError> {
        let name = object_name(payload)
            .ok_or_else(|| ClusterError::InvalidResource("metadata.name is required".into()))?;
        let namespace = match (kind.cluster_scoped, namespace) {
            (true, _) => None,
            (false, Some(ns)) => Some(ns.to_string()),
            (false, None) => {
                return Err(ClusterError::InvalidResource(format!(
                    "{} {} requires a namespace",
                    kind.name, name
                )))
            }
        };
        Ok((kind.name.clone(), namespace, name.to_string()))
    }

    /// Failure registered with `failing_apply`, checked after the call is recorded
    fn injected_failure(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        if self.apply_failures.contains(&(key.0.clone(), key.2.clone())) {
            return Err(ClusterError::Api {
                status: 500,
                message: format!("injected failure for {} {}", key.0, key.2),
            });
        }
        Ok(())
    }

    fn prepare_document(kind: &ResourceKind, key: &ObjectKey, payload: &RawResource) -> Value {
        let mut doc = payload.clone();
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("kind".into(), json!(kind.name));
            obj.insert("apiVersion".into(), json!(kind.api_version()));
        }
        if let (Some(ns), Some(meta)) = (
            key.1.as_deref(),
            doc.get_mut("metadata").and_then(Value::as_object_mut),
        ) {
            meta.insert("namespace".into(), json!(ns));
        }
        doc
    }
}

#[async_trait]
impl ClusterAccess for InMemoryCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        self.pause().await;
        self.record(ClusterCall::ListNamespaces);
        if self.fail_namespaces {
            return Err(ClusterError::Transport("injected namespace failure".into()));
        }
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|(kind, _, _)| kind == NAMESPACE_KIND)
            .map(|(_, _, name)| name.clone())
            .collect())
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        scope: &Scope,
    ) -> Result<Vec<RawResource>, ClusterError> {
        self.pause().await;
        self.record(ClusterCall::List {
            kind: kind.name.clone(),
            scope: scope.clone(),
        });
        if self
            .list_failures
            .contains(&(kind.name.clone(), scope.clone()))
        {
            return Err(ClusterError::Api {
                status: 403,
                message: format!("cannot list {} in {}", kind.plural, scope),
            });
        }
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|((k, ns, _), _)| k == &kind.name && ns.as_deref() == scope.namespace())
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError> {
        self.pause().await;
        let key = self.check_apply(kind, namespace, payload)?;
        self.record(ClusterCall::Create {
            kind: key.0.clone(),
            namespace: key.1.clone(),
            name: key.2.clone(),
        });
        self.injected_failure(&key)?;

        let mut objects = self.objects.lock();
        if let Some(ns) = &key.1 {
            let ns_key = (NAMESPACE_KIND.to_string(), None, ns.clone());
            if !objects.contains_key(&ns_key) {
                return Err(ClusterError::Api {
                    status: 404,
                    message: format!("namespaces \"{}\" not found", ns),
                });
            }
        }
        if objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: key.0,
                name: key.2,
            });
        }
        if payload.pointer("/metadata/resourceVersion").is_some() {
            return Err(ClusterError::Api {
                status: 400,
                message: "resourceVersion should not be set on objects to be created".into(),
            });
        }

        let mut doc = Self::prepare_document(kind, &key, payload);
        self.stamp_created(&mut doc);
        objects.insert(key, doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError> {
        self.pause().await;
        let key = self.check_apply(kind, namespace, payload)?;
        self.record(ClusterCall::Update {
            kind: key.0.clone(),
            namespace: key.1.clone(),
            name: key.2.clone(),
        });
        self.injected_failure(&key)?;

        let mut objects = self.objects.lock();
        let Some(existing) = objects.get(&key) else {
            return Err(ClusterError::NotFound {
                kind: key.0,
                name: key.2,
            });
        };

        let current_rev = existing.pointer("/metadata/resourceVersion").cloned();
        if let Some(sent) = payload.pointer("/metadata/resourceVersion") {
            if Some(sent) != current_rev.as_ref() {
                return Err(ClusterError::Api {
                    status: 409,
                    message: format!("the object {} has been modified", key.2),
                });
            }
        }

        let preserved = existing
            .get("metadata")
            .and_then(Value::as_object)
            .map(|meta| {
                ["uid", "creationTimestamp"]
                    .iter()
                    .filter_map(|field| meta.get(*field).map(|v| (field.to_string(), v.clone())))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut doc = Self::prepare_document(kind, &key, payload);
        let rev = self.next_revision();
        if let Some(meta) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
            for (field, value) in preserved {
                meta.insert(field, value);
            }
            meta.insert("resourceVersion".into(), json!(rev.to_string()));
        }
        objects.insert(key, doc.clone());
        Ok(doc)
    }
}
