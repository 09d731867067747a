// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync writer.
//!
//! [`SyncWriter`] keeps two projections of flags and segments in step with the
//! authoritative store: a value cache (`id → snapshot`) and one ordered index
//! per environment and kind. The stores offer no multi-key transaction, so
//! every operation is an explicit two-step sequence:
//!
//! ```text
//! upsert:  normalize ─► SET value ─► ZADD index        Absent → CacheOnly → Indexed
//! delete:  DEL value ─► ZREM index                     Indexed → CacheOnly → Absent
//! ```
//!
//! Upserts write the value first so an index reader never finds an id without
//! a value behind it. If the second step fails the writer reports
//! [`SyncError::PartialSync`] with the remaining command and never tries to
//! undo the first one. Replaying the call, or [`SyncWriter::resume`] with the
//! reported [`PendingStep`], finishes the job.
//!
//! Deletes remove the value first by default ([`DeleteOrder::ValueFirst`]),
//! which can leave the index pointing at a missing value until the ZREM is
//! retried. [`DeleteOrder::IndexFirst`] flips that.
//!
//! Concurrent writes to the same id are not serialized here: each store is
//! last-write-wins on its own, and callers that race an upsert against a
//! delete for one id must order them upstream.

use std::sync::Arc;

use tracing::{debug, field, warn, Span};
use uuid::Uuid;

use crate::config::{DeleteOrder, SyncConfig};
use crate::entity::{Entity, EntityKind};
use crate::error::{PendingStep, SyncError};
use crate::ingress::{normalize, RawEntity};
use crate::keys::KeyCodec;
use crate::metrics::LatencyTimer;
use crate::storage::redis::RedisStore;
use crate::storage::traits::{EnvironmentIndex, StorageError, ValueCache};

/// Writes flag and segment projections. Cheap to clone; all clones share the
/// same store handles.
#[derive(Clone)]
pub struct SyncWriter {
    values: Arc<dyn ValueCache>,
    index: Arc<dyn EnvironmentIndex>,
    keys: KeyCodec,
    delete_order: DeleteOrder,
}

impl SyncWriter {
    /// Build a writer over store handles owned by the caller.
    pub fn new(values: Arc<dyn ValueCache>, index: Arc<dyn EnvironmentIndex>, keys: KeyCodec) -> Self {
        Self {
            values,
            index,
            keys,
            delete_order: DeleteOrder::default(),
        }
    }

    /// Build a writer with the key prefix and delete order from `config`.
    pub fn from_config(
        values: Arc<dyn ValueCache>,
        index: Arc<dyn EnvironmentIndex>,
        config: &SyncConfig,
    ) -> Self {
        Self::new(values, index, KeyCodec::new(config.redis_prefix.clone()))
            .with_delete_order(config.delete_order)
    }

    /// Connect to `config.redis_url` and use that one connection for both
    /// projections.
    pub async fn connect(config: &SyncConfig) -> Result<Self, StorageError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("redis_url".into()))?;

        let store = Arc::new(RedisStore::connect(url, config.command_retry()).await?);
        Ok(Self::from_config(store.clone(), store, config))
    }

    #[must_use]
    pub fn with_delete_order(mut self, order: DeleteOrder) -> Self {
        self.delete_order = order;
        self
    }

    #[must_use]
    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    #[must_use]
    pub fn delete_order(&self) -> DeleteOrder {
        self.delete_order
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Per-kind entry points
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn upsert_flag(&self, raw: &RawEntity) -> Result<Entity, SyncError> {
        self.upsert(raw, EntityKind::Flag).await
    }

    pub async fn upsert_segment(&self, raw: &RawEntity) -> Result<Entity, SyncError> {
        self.upsert(raw, EntityKind::Segment).await
    }

    pub async fn delete_flag(&self, environment_id: Uuid, flag_id: Uuid) -> Result<(), SyncError> {
        self.delete(environment_id, flag_id, EntityKind::Flag).await
    }

    pub async fn delete_segment(&self, environment_id: Uuid, segment_id: Uuid) -> Result<(), SyncError> {
        self.delete(environment_id, segment_id, EntityKind::Segment).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Core sequences
    // ═══════════════════════════════════════════════════════════════════════

    /// Normalize `raw` and project it: value first, then index.
    ///
    /// Returns the canonical entity that was written. Overwrites any previous
    /// value for the same id; replaying with unchanged content is a no-op on
    /// the observable state.
    #[tracing::instrument(skip(self, raw), fields(kind = %kind, id = field::Empty))]
    pub async fn upsert(&self, raw: &RawEntity, kind: EntityKind) -> Result<Entity, SyncError> {
        let timer = LatencyTimer::new(kind, "upsert");
        timer.finish(self.upsert_inner(raw, kind).await)
    }

    async fn upsert_inner(&self, raw: &RawEntity, kind: EntityKind) -> Result<Entity, SyncError> {
        let entity = normalize(raw, kind).map_err(|source| SyncError::Validation { kind, source })?;
        Span::current().record("id", field::display(entity.id));

        let key = self.keys.cache_key(kind, entity.id);
        self.values
            .set(&key, &entity.snapshot)
            .await
            .map_err(SyncError::StoreUnavailable)?;
        debug!(key = %key, digest = %entity.digest(), "Value written");

        let index_key = self.keys.index_key(entity.environment_id, kind);
        let member = KeyCodec::member(entity.id);
        if let Err(source) = self.index.add(&index_key, &member, entity.score).await {
            warn!(index_key = %index_key, error = %source, "Value written but index add failed");
            return Err(SyncError::PartialSync {
                kind,
                id: entity.id,
                value_written: true,
                index_written: false,
                pending: PendingStep::IndexAdd { index_key, member, score: entity.score },
                source,
            });
        }
        debug!(index_key = %index_key, score = entity.score, "Indexed");

        Ok(entity)
    }

    /// Remove an entity from both projections. Deleting something that is
    /// not there succeeds.
    #[tracing::instrument(skip(self), fields(kind = %kind, env = %environment_id, id = %entity_id))]
    pub async fn delete(&self, environment_id: Uuid, entity_id: Uuid, kind: EntityKind) -> Result<(), SyncError> {
        let timer = LatencyTimer::new(kind, "delete");
        timer.finish(self.delete_inner(environment_id, entity_id, kind).await)
    }

    async fn delete_inner(&self, environment_id: Uuid, entity_id: Uuid, kind: EntityKind) -> Result<(), SyncError> {
        let key = self.keys.cache_key(kind, entity_id);
        let index_key = self.keys.index_key(environment_id, kind);
        let member = KeyCodec::member(entity_id);

        match self.delete_order {
            DeleteOrder::ValueFirst => {
                self.values.delete(&key).await.map_err(SyncError::StoreUnavailable)?;
                debug!(key = %key, "Value deleted");

                if let Err(source) = self.index.remove(&index_key, &member).await {
                    warn!(index_key = %index_key, error = %source, "Value deleted but index still references it");
                    return Err(SyncError::PartialSync {
                        kind,
                        id: entity_id,
                        value_written: true,
                        index_written: false,
                        pending: PendingStep::IndexRemove { index_key, member },
                        source,
                    });
                }
                debug!(index_key = %index_key, "Removed from index");
            }
            DeleteOrder::IndexFirst => {
                self.index
                    .remove(&index_key, &member)
                    .await
                    .map_err(SyncError::StoreUnavailable)?;
                debug!(index_key = %index_key, "Removed from index");

                if let Err(source) = self.values.delete(&key).await {
                    warn!(key = %key, error = %source, "Unindexed but value delete failed");
                    return Err(SyncError::PartialSync {
                        kind,
                        id: entity_id,
                        value_written: false,
                        index_written: true,
                        pending: PendingStep::ValueDelete { key },
                        source,
                    });
                }
                debug!(key = %key, "Value deleted");
            }
        }

        Ok(())
    }

    /// Run only the step a [`SyncError::PartialSync`] left outstanding.
    ///
    /// The command is idempotent, so resuming twice, or after the caller
    /// already replayed the whole operation, is harmless. A failure here
    /// leaves the projection where it was.
    #[tracing::instrument(skip(self), fields(kind = %kind, step = %pending))]
    pub async fn resume(&self, kind: EntityKind, pending: &PendingStep) -> Result<(), SyncError> {
        let timer = LatencyTimer::new(kind, "resume");
        let result = match pending {
            PendingStep::IndexAdd { index_key, member, score } => {
                self.index.add(index_key, member, *score).await
            }
            PendingStep::IndexRemove { index_key, member } => self.index.remove(index_key, member).await,
            PendingStep::ValueDelete { key } => self.values.delete(key).await,
        };
        if result.is_ok() {
            debug!("Pending step completed");
        }
        timer.finish(result.map_err(SyncError::StoreUnavailable))
    }
}
