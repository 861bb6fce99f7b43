use serde_json::Value;

use crate::cluster::RawResource;

/// `metadata` fields the API server assigns and that must never be replayed
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "managedFields",
    "generation",
    "selfLink",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
];

/// Strip server-assigned metadata from a decoded resource document.
///
/// Everything else, including labels, annotations, spec and status, is left
/// untouched. Documents without an object `metadata` are returned as is.
pub fn sanitize(mut resource: RawResource) -> RawResource {
    if let Some(meta) = resource.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in SERVER_ASSIGNED_FIELDS {
            meta.remove(*field);
        }
    }
    resource
}
