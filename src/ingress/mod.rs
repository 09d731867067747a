// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ingress normalization.
//!
//! Flags and segments reach the writer in one of two shapes:
//!
//! - [`RawEntity::Document`]: a typed record read from the authoritative
//!   document store
//! - [`RawEntity::Transport`]: a loosely-typed JSON tree as parsed from a
//!   request or message payload
//!
//! [`normalize`] collapses both into one [`Entity`] before anything derives a
//! key or touches a store. The same logical record yields byte-identical
//! snapshots and equal scores regardless of shape.
//!
//! # Example
//!
//! ```
//! use flag_sync::{normalize, DocumentRecord, EntityKind, RawEntity};
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! let id = Uuid::new_v4();
//! let env = Uuid::new_v4();
//!
//! let transport = RawEntity::Transport(json!({
//!     "id": id.to_string(),
//!     "envId": env.to_string(),
//!     "name": "beta",
//! }));
//! let document = RawEntity::Document(
//!     DocumentRecord::new()
//!         .with("_id", id)
//!         .with("envId", env)
//!         .with("name", "beta"),
//! );
//!
//! let a = normalize(&transport, EntityKind::Flag).unwrap();
//! let b = normalize(&document, EntityKind::Flag).unwrap();
//! assert_eq!(a.snapshot, b.snapshot);
//! ```

mod canonical;
pub mod document;

use serde_json::Value;

use crate::entity::{Entity, EntityKind};
use crate::error::ValidationError;

pub use document::{DocValue, DocumentRecord};

/// An ingress record in either supported shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntity {
    Document(DocumentRecord),
    Transport(Value),
}

impl From<DocumentRecord> for RawEntity {
    fn from(doc: DocumentRecord) -> Self {
        Self::Document(doc)
    }
}

impl From<Value> for RawEntity {
    fn from(value: Value) -> Self {
        Self::Transport(value)
    }
}

/// Convert either representation into the canonical entity.
///
/// Fails with [`ValidationError`] when `id`/`environmentId` are missing or
/// not UUIDs, or when a value has no canonical encoding.
pub fn normalize(raw: &RawEntity, kind: EntityKind) -> Result<Entity, ValidationError> {
    let map = match raw {
        RawEntity::Document(doc) => doc.to_json()?,
        RawEntity::Transport(Value::Object(map)) => map.clone(),
        RawEntity::Transport(_) => return Err(ValidationError::NotAnObject),
    };
    canonical::finish(map, kind)
}
