// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for flag-sync.
//!
//! Uses the `metrics` crate for backend-agnostic collection. The host service
//! chooses the exporter (Prometheus, OTEL, etc.).
//!
//! # Metric Naming Convention
//! - `flag_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: flag, segment
//! - `operation`: upsert, delete, resume
//! - `status`: success, invalid, unavailable, partial

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use crate::entity::EntityKind;
use crate::error::SyncError;

/// Label value for the outcome of an operation
#[must_use]
pub fn status_label<T>(result: &Result<T, SyncError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(SyncError::Validation { .. }) => "invalid",
        Err(SyncError::StoreUnavailable(_)) => "unavailable",
        Err(SyncError::PartialSync { .. }) => "partial",
    }
}

/// Record a finished writer operation
pub fn record_operation(kind: EntityKind, operation: &'static str, status: &'static str) {
    counter!(
        "flag_sync_operations_total",
        "kind" => kind.as_str(),
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a write sequence that stopped half way
pub fn record_partial(kind: EntityKind, operation: &'static str) {
    counter!(
        "flag_sync_partial_total",
        "kind" => kind.as_str(),
        "operation" => operation
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(kind: EntityKind, operation: &'static str, duration: Duration) {
    histogram!(
        "flag_sync_operation_seconds",
        "kind" => kind.as_str(),
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// A timer that records latency and outcome together.
pub struct LatencyTimer {
    kind: EntityKind,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    #[must_use]
    pub fn new(kind: EntityKind, operation: &'static str) -> Self {
        Self {
            kind,
            operation,
            start: Instant::now(),
        }
    }

    /// Record latency and outcome, then hand the result back.
    pub fn finish<T>(self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        record_latency(self.kind, self.operation, self.start.elapsed());
        record_operation(self.kind, self.operation, status_label(&result));
        if matches!(result, Err(SyncError::PartialSync { .. })) {
            record_partial(self.kind, self.operation);
        }
        result
    }
}
