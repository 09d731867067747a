// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic flag-sync usage example.
//!
//! Demonstrates:
//! 1. Building a writer (Redis when `REDIS_URL` is set, in-memory otherwise)
//! 2. Upserting one flag through both ingress shapes
//! 3. Upserting and deleting a segment
//! 4. A partial sync and its resumption
//! 5. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! # In-memory
//! cargo run --example basic_usage
//!
//! # Against Redis
//! REDIS_URL=redis://localhost:6379 cargo run --example basic_usage
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flag_sync::{
    DocumentRecord, EntityKind, EnvironmentIndex, InMemoryStore, KeyCodec, RawEntity, StorageError,
    SyncConfig, SyncError, SyncWriter,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use uuid::Uuid;

/// Index wrapper with an off switch, to show a partial sync
struct SwitchableIndex {
    inner: Arc<InMemoryStore>,
    down: AtomicBool,
}

#[async_trait]
impl EnvironmentIndex for SwitchableIndex {
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("index switched off".into()));
        }
        self.inner.add(index_key, member, score).await
    }

    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("index switched off".into()));
        }
        self.inner.remove(index_key, member).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flag_sync=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Build the writer
    // ─────────────────────────────────────────────────────────────────────────
    let memory = Arc::new(InMemoryStore::new());
    let writer = match std::env::var("REDIS_URL") {
        Ok(url) => {
            println!("📦 Connecting to {url}...");
            let config = SyncConfig { redis_url: Some(url), ..Default::default() };
            SyncWriter::connect(&config).await?
        }
        Err(_) => {
            println!("📦 REDIS_URL not set, using the in-memory store");
            SyncWriter::new(memory.clone(), memory.clone(), KeyCodec::default())
        }
    };

    let env = Uuid::new_v4();
    let flag_id = Uuid::new_v4();

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Same flag, two shapes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Upserting flag {flag_id} via transport JSON...");
    let via_transport = writer
        .upsert_flag(&RawEntity::Transport(json!({
            "id": flag_id.to_string(),
            "envId": env.to_string(),
            "name": "beta",
            "isEnabled": true,
            "updatedAt": "2024-06-01T09:00:00Z",
        })))
        .await?;
    println!("   └─ digest {}", via_transport.digest());

    println!("📝 Upserting the same flag via document record...");
    let updated = chrono::DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z")?.with_timezone(&chrono::Utc);
    let via_document = writer
        .upsert_flag(
            &DocumentRecord::new()
                .with("_id", flag_id)
                .with("envId", env)
                .with("isEnabled", true)
                .with("name", "beta")
                .with("updatedAt", updated)
                .into(),
        )
        .await?;
    println!("   └─ digest {}", via_document.digest());
    assert_eq!(via_transport.snapshot, via_document.snapshot);
    println!("   ✅ Identical snapshots");

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Segment lifecycle
    // ─────────────────────────────────────────────────────────────────────────
    let segment_id = Uuid::new_v4();
    println!("\n📝 Upserting then deleting segment {segment_id}...");
    writer
        .upsert_segment(&DocumentRecord::new().with("_id", segment_id).with("envId", env).with("name", "vip").into())
        .await?;
    writer.delete_segment(env, segment_id).await?;
    writer.delete_segment(env, segment_id).await?;
    println!("   ✅ Deleted (twice, idempotent)");

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Partial sync and resume
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⚠️  Switching the index off and upserting...");
    let scratch = Arc::new(InMemoryStore::new());
    let index = Arc::new(SwitchableIndex { inner: scratch.clone(), down: AtomicBool::new(true) });
    let flaky = SyncWriter::new(scratch.clone(), index.clone(), KeyCodec::default());

    let raw = RawEntity::Transport(json!({"id": flag_id.to_string(), "envId": env.to_string(), "name": "beta"}));
    match flaky.upsert_flag(&raw).await {
        Err(err @ SyncError::PartialSync { .. }) => {
            println!("   └─ {err}");
            index.down.store(false, Ordering::SeqCst);
            if let Some(pending) = err.pending() {
                flaky.resume(EntityKind::Flag, pending).await?;
                println!("   ✅ Resumed: {pending}");
            }
        }
        other => println!("   └─ unexpected: {other:?}"),
    }
    println!(
        "   └─ index now holds {:?}",
        scratch.members(&flaky.keys().index_key(env, EntityKind::Flag))
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    Ok(())
}

/// Dump captured counters and histograms, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = vec![];
    let mut histograms = vec![];

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = format!("{}{{{}}}", key.name(), labels.join(","));

        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, samples.len(), sum));
            }
            DebugValue::Gauge(_) => {}
        }
    }
    counters.sort();
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in &counters {
        println!("   └─ {name} = {value}");
    }
    for (name, count, sum) in &histograms {
        println!("   └─ {name} count={count} sum={sum:.6}s");
    }
}
