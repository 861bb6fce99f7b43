//! Snapshot format and layout
//!
//! A snapshot is a directory tree holding one `{kind, resource}` JSON
//! document per resource instance. This module owns the wrapper type, the
//! path layout, and the sanitizer applied before a document is replayed.

mod record;
pub mod sanitize;
mod tree;

pub use record::{ResourceIdentity, ResourceRecord};
pub use sanitize::{sanitize, SERVER_ASSIGNED_FIELDS};
pub use tree::{is_safe_segment, SnapshotFiles, SnapshotTree};
