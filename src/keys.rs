// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key and score derivation.
//!
//! Layout (with the default `featbit:` prefix):
//!
//! ```text
//! featbit:flag:{flagId}                → snapshot bytes
//! featbit:segment:{segmentId}          → snapshot bytes
//! featbit:flag-index:{envId}           → ZSET of flag ids
//! featbit:segment-index:{envId}        → ZSET of segment ids
//! ```
//!
//! Everything here is pure: no I/O, no failure mode.

use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

/// Derives cache keys, index keys and index members for a key namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: String,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PREFIX)
    }
}

impl KeyCodec {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn flag_key(&self, id: Uuid) -> String {
        self.cache_key(EntityKind::Flag, id)
    }

    #[must_use]
    pub fn segment_key(&self, id: Uuid) -> String {
        self.cache_key(EntityKind::Segment, id)
    }

    /// Value-cache key for an entity of `kind`.
    #[must_use]
    pub fn cache_key(&self, kind: EntityKind, id: Uuid) -> String {
        format!("{}{}:{}", self.prefix, kind.as_str(), Self::member(id))
    }

    /// Sorted-set key holding every `kind` member of one environment.
    #[must_use]
    pub fn index_key(&self, environment_id: Uuid, kind: EntityKind) -> String {
        format!("{}{}-index:{}", self.prefix, kind.as_str(), Self::member(environment_id))
    }

    /// Index member for an id: lowercase hyphenated UUID, which is also the
    /// natural tie-break order for equal scores.
    #[must_use]
    pub fn member(id: Uuid) -> String {
        id.hyphenated().to_string()
    }

    /// Score from the record's `updatedAt` (Unix millis). Records without a
    /// timestamp sort first.
    #[must_use]
    pub fn score_from_millis(updated_at_millis: Option<i64>) -> f64 {
        updated_at_millis.map_or(0.0, |ms| ms as f64)
    }

    #[must_use]
    pub fn score(entity: &Entity) -> f64 {
        entity.score
    }
}
