// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the flag sync writer.
//!
//! # Example
//!
//! ```
//! use flag_sync::{SyncConfig, DeleteOrder};
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.redis_prefix, "featbit:");
//! assert_eq!(config.delete_order, DeleteOrder::ValueFirst);
//!
//! // Full config
//! let config = SyncConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     redis_prefix: "myapp:".into(),
//!     retry_max_attempts: 5,
//!     delete_order: DeleteOrder::IndexFirst,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::resilience::retry::RetryConfig;

pub(crate) const DEFAULT_PREFIX: &str = "featbit:";

/// Which half a delete removes first.
///
/// `ValueFirst` can leave the index briefly pointing at a missing value if
/// the second command fails. `IndexFirst` hides the entity from enumeration
/// before its value goes away, so a failure leaves only an unreachable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOrder {
    #[default]
    ValueFirst,
    IndexFirst,
}

/// Configuration for the sync writer and its Redis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key namespace prepended to every cache and index key
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,

    /// Attempts per store command before reporting the store unavailable
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default)]
    pub delete_order: DeleteOrder,
}

fn default_redis_prefix() -> String { DEFAULT_PREFIX.to_string() }
fn default_retry_max_attempts() -> usize { 3 }
fn default_retry_initial_delay_ms() -> u64 { 100 }
fn default_retry_max_delay_ms() -> u64 { 2_000 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_prefix: default_redis_prefix(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            delete_order: DeleteOrder::default(),
        }
    }
}

impl SyncConfig {
    /// Per-command retry policy derived from the `retry_*` fields.
    #[must_use]
    pub fn command_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: Some(self.retry_max_attempts.max(1)),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            factor: 2.0,
        }
    }
}
