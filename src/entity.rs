// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Canonical entity model.
//!
//! An [`Entity`] is what every ingress representation collapses into before
//! any key derivation or store write happens. Its `snapshot` bytes and its
//! `score` are pure functions of content, so the same logical flag or segment
//! always projects to the same cache value and index position.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The two kinds of definition this crate projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Flag,
    Segment,
}

impl EntityKind {
    /// Stable lowercase name, used in keys, logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Segment => "segment",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized flag or segment, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub kind: EntityKind,
    /// Canonical JSON encoding of the whole record (sorted keys, compact).
    pub snapshot: Vec<u8>,
    /// Ordering key within the environment index: `updatedAt` in Unix millis.
    pub score: f64,
}

impl Entity {
    /// Hex SHA-256 of the snapshot. Handy for logging and for comparing
    /// projections without shipping the full payload around.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.snapshot))
    }
}

/// Projection state of a single entity, as seen by the writer.
///
/// ```text
/// Upsert:  Absent → CacheOnly → Indexed
/// Delete:  Indexed → CacheOnly → Absent
/// ```
///
/// `CacheOnly` only exists in between the two store commands, or after one
/// of them failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Absent,
    CacheOnly,
    Indexed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::CacheOnly => write!(f, "CacheOnly"),
            Self::Indexed => write!(f, "Indexed"),
        }
    }
}
