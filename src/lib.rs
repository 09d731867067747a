//! # Flag Sync
//!
//! Keeps read-optimized Redis projections of feature flags and audience
//! segments in step with the authoritative document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Ingress                              │
//! │  • DocumentRecord (typed, from the document store)          │
//! │  • serde_json::Value (transport payloads)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  normalize()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Canonical Entity                        │
//! │  • id, environmentId, kind                                  │
//! │  • snapshot: sorted-key compact JSON                        │
//! │  • score: updatedAt (Unix millis)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  SyncWriter
//!                              ▼
//! ┌─────────────────────────────┐   ┌───────────────────────────┐
//! │  Value cache (SET / DEL)    │ → │  Env index (ZADD / ZREM)  │
//! │  {prefix}flag:{id}          │   │  {prefix}flag-index:{env} │
//! │  {prefix}segment:{id}       │   │  {prefix}segment-index:.. │
//! └─────────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! There is no transaction across the two projections. A failure between the
//! two commands is reported as [`SyncError::PartialSync`] and left for the
//! caller to resume or for a reconciliation sweep to repair.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flag_sync::{RawEntity, SyncConfig, SyncWriter};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     ..Default::default()
//! };
//! let writer = SyncWriter::connect(&config).await?;
//!
//! let flag = RawEntity::Transport(json!({
//!     "id": "0b6f7c59-2d0a-4a5e-9d38-1a4f8f1d2c01",
//!     "envId": "9f1e4b7a-5c3d-4e2f-8a1b-6c7d8e9f0a12",
//!     "name": "beta",
//! }));
//! writer.upsert_flag(&flag).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`writer`]: the [`SyncWriter`] orchestrating both projections
//! - [`ingress`]: normalization of document and transport records
//! - [`keys`]: key and score derivation
//! - [`storage`]: store contracts and the Redis / in-memory backends
//! - [`resilience`]: per-command retry
//! - [`metrics`]: operation counters and latencies

pub mod config;
pub mod entity;
pub mod error;
pub mod ingress;
pub mod keys;
pub mod metrics;
pub mod resilience;
pub mod storage;
pub mod writer;

pub use config::{DeleteOrder, SyncConfig};
pub use entity::{Entity, EntityKind, SyncState};
pub use error::{PendingStep, SyncError, ValidationError};
pub use ingress::{normalize, DocValue, DocumentRecord, RawEntity};
pub use keys::KeyCodec;
pub use crate::metrics::LatencyTimer;
pub use resilience::retry::RetryConfig;
pub use storage::memory::InMemoryStore;
pub use storage::redis::RedisStore;
pub use storage::traits::{EnvironmentIndex, StorageError, ValueCache};
pub use writer::SyncWriter;
