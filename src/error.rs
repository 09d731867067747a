// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for sync operations.
//!
//! - [`ValidationError`]: the ingress record is unusable. Raised before any
//!   store command, so nothing was written.
//! - [`SyncError::StoreUnavailable`]: the first command of a sequence failed.
//!   Nothing changed; retrying the whole operation is safe.
//! - [`SyncError::PartialSync`]: the first command landed, the second did not.
//!   The [`PendingStep`] says exactly what is left to do.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::{EntityKind, SyncState};
use crate::storage::traits::StorageError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("field '{field}' is not a valid UUID: {value:?}")]
    InvalidUuid { field: &'static str, value: String },
    #[error("field '{field}' is not a valid timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("field '{field}' holds a value with no canonical encoding")]
    UnsupportedValue { field: String },
}

/// The store command a partial sync still owes.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingStep {
    /// `ZADD index_key score member`
    IndexAdd { index_key: String, member: String, score: f64 },
    /// `ZREM index_key member`
    IndexRemove { index_key: String, member: String },
    /// `DEL key` (only when deletes run index-first)
    ValueDelete { key: String },
}

impl std::fmt::Display for PendingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexAdd { index_key, member, score } => {
                write!(f, "ZADD {} {} {}", index_key, score, member)
            }
            Self::IndexRemove { index_key, member } => write!(f, "ZREM {} {}", index_key, member),
            Self::ValueDelete { key } => write!(f, "DEL {}", key),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid {kind} record: {source}")]
    Validation {
        kind: EntityKind,
        #[source]
        source: ValidationError,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    #[error(
        "partial sync of {kind} {id}: value_written={value_written}, index_written={index_written}, pending: {pending}"
    )]
    PartialSync {
        kind: EntityKind,
        id: Uuid,
        value_written: bool,
        index_written: bool,
        pending: PendingStep,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    /// Projection state the failed operation left behind, when it is known.
    ///
    /// Validation failures and first-step failures change nothing, so the
    /// state is whatever it was before the call and `None` is returned.
    #[must_use]
    pub fn state(&self) -> Option<SyncState> {
        match self {
            Self::PartialSync { .. } => Some(SyncState::CacheOnly),
            Self::Validation { .. } | Self::StoreUnavailable(_) => None,
        }
    }

    /// The remaining command of a partial sync, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingStep> {
        match self {
            Self::PartialSync { pending, .. } => Some(pending),
            _ => None,
        }
    }

    /// Whether replaying the same call can succeed without changing its input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation { .. })
    }
}
