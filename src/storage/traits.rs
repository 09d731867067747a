// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write-side contracts for the two projections.
//!
//! Both traits only cover what the writer needs. Reads (GET, ZRANGE) are
//! served by whoever consumes the projections.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Connection refused, dropped, or timed out. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered with an error (wrong key type, bad command).
    #[error("storage backend error: {0}")]
    Backend(String),
    /// No store could be reached because a required setting is missing.
    #[error("store not configured: {0}")]
    NotConfigured(String),
}

impl StorageError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Key → bytes store (`SET` / `DEL`).
#[async_trait]
pub trait ValueCache: Send + Sync {
    /// Unconditional overwrite. No expiry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Per-environment ordered set of member ids (`ZADD` / `ZREM`).
///
/// Consumers enumerate ascending by score, ties broken by member.
#[async_trait]
pub trait EnvironmentIndex: Send + Sync {
    /// Insert `member`, or update its score if already present.
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError>;

    /// Remove `member`. Absent members are not an error.
    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError>;
}
