// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis backend for both projections.
//!
//! - **Value cache** → plain STRING keys (`SET` / `DEL`), no TTL
//! - **Environment index** → sorted sets (`ZADD` / `ZREM`), one per
//!   environment and kind
//!
//! Each command is retried on its own for connection-level failures. Redis
//! answering with an error (e.g. `WRONGTYPE`) is not retried.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use super::traits::{EnvironmentIndex, StorageError, ValueCache};
use crate::resilience::retry::{retry, retry_when, RetryConfig};

/// Shared Redis handle implementing [`ValueCache`] and [`EnvironmentIndex`].
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own,
/// so cloning the store is cheap and every clone talks over the same socket.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    retry: RetryConfig,
}

impl RedisStore {
    /// Connect with the default command retry policy.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::connect(connection_string, RetryConfig::query()).await
    }

    /// Connect, failing fast (~5s) if Redis cannot be reached at all.
    pub async fn connect(connection_string: &str, retry_config: RetryConfig) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(map_redis_error)?;

        Ok(Self::from_connection(connection, retry_config))
    }

    /// Wrap a connection owned by the surrounding service.
    #[must_use]
    pub fn from_connection(connection: ConnectionManager, retry_config: RetryConfig) -> Self {
        Self { connection, retry: retry_config }
    }

    /// Get a clone of the connection manager (for sharing with readers)
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

/// Connection-level failures become `Unavailable`; anything Redis itself
/// rejected stays a `Backend` error.
fn map_redis_error(e: RedisError) -> StorageError {
    if is_transient(&e) {
        StorageError::Unavailable(e.to_string())
    } else {
        StorageError::Backend(e.to_string())
    }
}

fn is_transient(e: &RedisError) -> bool {
    e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
}

#[async_trait]
impl ValueCache for RedisStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let conn = self.connection.clone();

        retry_when("redis_set", &self.retry, is_transient, || {
            let mut conn = conn.clone();
            async move {
                let _: () = conn.set(key, value).await?;
                Ok::<(), RedisError>(())
            }
        })
        .await
        .map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.connection.clone();

        retry_when("redis_del", &self.retry, is_transient, || {
            let mut conn = conn.clone();
            async move {
                let _: () = conn.del(key).await?;
                Ok::<(), RedisError>(())
            }
        })
        .await
        .map_err(map_redis_error)
    }
}

#[async_trait]
impl EnvironmentIndex for RedisStore {
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError> {
        let conn = self.connection.clone();

        retry_when("redis_zadd", &self.retry, is_transient, || {
            let mut conn = conn.clone();
            async move {
                // ZADD key score member: inserts or moves, never duplicates
                let _: () = conn.zadd(index_key, member, score).await?;
                Ok::<(), RedisError>(())
            }
        })
        .await
        .map_err(map_redis_error)
    }

    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError> {
        let conn = self.connection.clone();

        retry_when("redis_zrem", &self.retry, is_transient, || {
            let mut conn = conn.clone();
            async move {
                let _: () = conn.zrem(index_key, member).await?;
                Ok::<(), RedisError>(())
            }
        })
        .await
        .map_err(map_redis_error)
    }
}
