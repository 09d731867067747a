//! Chaos Testing for the sync writer
//!
//! Failure scenarios driven by store wrappers instead of real outages:
//! 1. **Failing wrappers** - precise error injection at specific call counts
//! 2. **Hanging wrappers** - a store call that never answers, then cancellation
//!
//! Everything runs against `InMemoryStore`, so no Docker is needed.
//!
//! ```bash
//! cargo test --test chaos
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use flag_sync::{
    DeleteOrder, DocumentRecord, EntityKind, EnvironmentIndex, InMemoryStore, KeyCodec,
    PendingStep, RawEntity, StorageError, SyncError, SyncState, SyncWriter, ValueCache,
};

// =============================================================================
// Failing Store Wrappers - Precise Error Injection
// =============================================================================

/// Injects `StorageError::Unavailable` on chosen calls (1-indexed).
pub struct FailingStore {
    inner: Arc<InMemoryStore>,
    call_count: AtomicU64,
    fail_on_calls: Vec<u64>,
    /// Fail every call from the first listed one onwards
    fail_permanently: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryStore>, fail_on_calls: Vec<u64>) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls,
            fail_permanently: AtomicBool::new(false),
        }
    }

    /// A store that fails every call after the first `n`
    pub fn fail_after(inner: Arc<InMemoryStore>, n: u64) -> Self {
        let store = Self::new(inner, vec![n + 1]);
        store.fail_permanently.store(true, Ordering::SeqCst);
        store
    }

    pub fn heal(&self) {
        self.fail_permanently.store(false, Ordering::SeqCst);
        self.call_count.store(u64::MAX / 2, Ordering::SeqCst);
    }

    fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = if self.fail_permanently.load(Ordering::SeqCst) {
            self.fail_on_calls.first().is_some_and(|first| count >= *first)
        } else {
            self.fail_on_calls.contains(&count)
        };
        if fail {
            Err(StorageError::Unavailable(format!("injected failure on call {count}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ValueCache for FailingStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        ValueCache::delete(self.inner.as_ref(), key).await
    }
}

#[async_trait]
impl EnvironmentIndex for FailingStore {
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.add(index_key, member, score).await
    }

    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.remove(index_key, member).await
    }
}

/// An index whose calls never complete while `hang` is set.
pub struct HangingIndex {
    inner: Arc<InMemoryStore>,
    hang: AtomicBool,
}

#[async_trait]
impl EnvironmentIndex for HangingIndex {
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.add(index_key, member, score).await
    }

    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.remove(index_key, member).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

const F1: &str = "4c1f7a2e-8b3d-4e5f-9a6b-7c8d9e0f1a2b";
const E1: &str = "e1e1e1e1-0000-4000-8000-000000000001";

fn uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap()
}

fn beta_flag() -> RawEntity {
    RawEntity::Transport(json!({
        "id": F1,
        "envId": E1,
        "name": "beta",
        "updatedAt": "2024-05-01T08:30:00.250Z",
    }))
}

fn writer_with_index(store: &Arc<InMemoryStore>, index: Arc<dyn EnvironmentIndex>) -> SyncWriter {
    SyncWriter::new(store.clone(), index, KeyCodec::default())
}

fn flag_indexed(store: &InMemoryStore, keys: &KeyCodec) -> bool {
    store.contains_member(&keys.index_key(uuid(E1), EntityKind::Flag), F1)
}

// =============================================================================
// Upsert failures
// =============================================================================

#[tokio::test]
async fn chaos_index_failure_after_value_write() {
    let store = Arc::new(InMemoryStore::new());
    let index = Arc::new(FailingStore::new(store.clone(), vec![1]));
    let writer = writer_with_index(&store, index.clone());

    let err = writer.upsert_flag(&beta_flag()).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::PartialSync { value_written: true, index_written: false, kind: EntityKind::Flag, .. }
    ));
    assert_eq!(err.state(), Some(SyncState::CacheOnly));
    // The value is already there, invisible to index-driven enumeration
    assert!(store.get(&writer.keys().flag_key(uuid(F1))).is_some());
    assert!(!flag_indexed(&store, writer.keys()));

    // Replaying the whole upsert reaches Indexed
    let entity = writer.upsert_flag(&beta_flag()).await.unwrap();
    assert!(flag_indexed(&store, writer.keys()));
    assert_eq!(store.get(&writer.keys().flag_key(uuid(F1))), Some(entity.snapshot));
    assert_eq!(index.calls(), 2);
}

#[tokio::test]
async fn chaos_resume_only_runs_pending_step() {
    let store = Arc::new(InMemoryStore::new());
    let values = Arc::new(FailingStore::new(store.clone(), vec![]));
    let index = Arc::new(FailingStore::new(store.clone(), vec![1]));
    let writer = SyncWriter::new(values.clone(), index.clone(), KeyCodec::default());

    let err = writer.upsert_flag(&beta_flag()).await.unwrap_err();
    let pending = err.pending().cloned().unwrap();
    assert!(matches!(pending, PendingStep::IndexAdd { .. }));

    writer.resume(EntityKind::Flag, &pending).await.unwrap();

    assert_eq!(values.calls(), 1, "resume must not rewrite the value");
    assert_eq!(index.calls(), 2);
    assert!(flag_indexed(&store, writer.keys()));
}

#[tokio::test]
async fn chaos_value_failure_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let values = Arc::new(FailingStore::fail_after(store.clone(), 0));
    let writer = SyncWriter::new(values, store.clone(), KeyCodec::default());

    let err = writer.upsert_flag(&beta_flag()).await.unwrap_err();

    assert!(matches!(err, SyncError::StoreUnavailable(StorageError::Unavailable(_))));
    assert!(err.state().is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn chaos_invalid_record_touches_no_store() {
    let store = Arc::new(InMemoryStore::new());
    let values = Arc::new(FailingStore::new(store.clone(), vec![]));
    let index = Arc::new(FailingStore::new(store.clone(), vec![]));
    let writer = SyncWriter::new(values.clone(), index.clone(), KeyCodec::default());

    let doc = DocumentRecord::new().with("name", "no ids");
    let err = writer.upsert_segment(&doc.into()).await.unwrap_err();

    assert!(matches!(err, SyncError::Validation { .. }));
    assert_eq!(values.calls(), 0);
    assert_eq!(index.calls(), 0);
}

// =============================================================================
// Delete failures
// =============================================================================

#[tokio::test]
async fn chaos_delete_index_failure_then_retry() {
    let store = Arc::new(InMemoryStore::new());
    // call 1 = upsert ZADD, call 2 = delete ZREM
    let index = Arc::new(FailingStore::new(store.clone(), vec![2]));
    let writer = writer_with_index(&store, index);

    writer.upsert_flag(&beta_flag()).await.unwrap();
    let err = writer.delete_flag(uuid(E1), uuid(F1)).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::PartialSync { value_written: true, index_written: false, pending: PendingStep::IndexRemove { .. }, .. }
    ));
    // Value gone, index still references it until the retry
    assert!(store.get(&writer.keys().flag_key(uuid(F1))).is_none());
    assert!(flag_indexed(&store, writer.keys()));

    writer.delete_flag(uuid(E1), uuid(F1)).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn chaos_index_first_delete_value_failure() {
    let store = Arc::new(InMemoryStore::new());
    // call 1 = upsert SET, call 2 = delete DEL
    let values = Arc::new(FailingStore::new(store.clone(), vec![2]));
    let writer = SyncWriter::new(values, store.clone(), KeyCodec::default())
        .with_delete_order(DeleteOrder::IndexFirst);

    writer.upsert_flag(&beta_flag()).await.unwrap();
    let err = writer.delete_flag(uuid(E1), uuid(F1)).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::PartialSync { value_written: false, index_written: true, pending: PendingStep::ValueDelete { .. }, .. }
    ));
    // Never a dangling index member: only an unreachable value
    assert!(!flag_indexed(&store, writer.keys()));
    assert!(store.get(&writer.keys().flag_key(uuid(F1))).is_some());

    let pending = err.pending().cloned().unwrap();
    writer.resume(EntityKind::Flag, &pending).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn chaos_resume_failure_keeps_step_pending() {
    let store = Arc::new(InMemoryStore::new());
    let index = Arc::new(FailingStore::fail_after(store.clone(), 0));
    let writer = writer_with_index(&store, index.clone());

    let err = writer.upsert_flag(&beta_flag()).await.unwrap_err();
    let pending = err.pending().cloned().unwrap();

    let resumed = writer.resume(EntityKind::Flag, &pending).await.unwrap_err();
    assert!(matches!(resumed, SyncError::StoreUnavailable(_)));
    assert!(!flag_indexed(&store, writer.keys()));

    index.heal();
    writer.resume(EntityKind::Flag, &pending).await.unwrap();
    assert!(flag_indexed(&store, writer.keys()));
}

// =============================================================================
// Cancellation between steps
// =============================================================================

#[tokio::test]
async fn chaos_cancelled_between_steps_is_cache_only() {
    let store = Arc::new(InMemoryStore::new());
    let index = Arc::new(HangingIndex { inner: store.clone(), hang: AtomicBool::new(true) });
    let writer = writer_with_index(&store, index.clone());

    let outcome = tokio::time::timeout(Duration::from_millis(50), writer.upsert_flag(&beta_flag())).await;
    assert!(outcome.is_err(), "upsert should have been cancelled");

    assert!(store.get(&writer.keys().flag_key(uuid(F1))).is_some());
    assert!(!flag_indexed(&store, writer.keys()));

    // Same recovery as a partial sync: replay
    index.hang.store(false, Ordering::SeqCst);
    writer.upsert_flag(&beta_flag()).await.unwrap();
    assert!(flag_indexed(&store, writer.keys()));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn chaos_concurrent_upserts_share_one_index() {
    let store = Arc::new(InMemoryStore::new());
    let writer = SyncWriter::new(store.clone(), store.clone(), KeyCodec::default());
    let env = uuid(E1);

    let mut handles = vec![];
    for i in 0..50u32 {
        let writer = writer.clone();
        handles.push(tokio::spawn(async move {
            let raw = RawEntity::Transport(json!({
                "id": Uuid::new_v4().to_string(),
                "environmentId": env.to_string(),
                "name": format!("flag-{i}"),
                // Five distinct timestamps, so ties are common
                "updatedAt": 1_700_000_000_000i64 + i64::from(i % 5),
            }));
            writer.upsert_flag(&raw).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let members = store.members(&writer.keys().index_key(env, EntityKind::Flag));
    assert_eq!(members.len(), 50);
    assert_eq!(store.len(), 50);
    for pair in members.windows(2) {
        let ((a, sa), (b, sb)) = (&pair[0], &pair[1]);
        assert!(sa < sb || (sa == sb && a < b), "index order broken at {a} / {b}");
    }
}
