use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{EnvironmentIndex, StorageError, ValueCache};

/// In-process value cache and environment index.
///
/// Mirrors Redis semantics closely enough for the writer: SET overwrites,
/// DEL/ZREM of absent entries are no-ops, ZADD updates the score of an
/// existing member, and an emptied sorted set disappears.
pub struct InMemoryStore {
    values: DashMap<String, Vec<u8>>,
    indexes: DashMap<String, HashMap<String, f64>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            indexes: DashMap::new(),
        }
    }

    /// `GET key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.get(key).map(|r| r.value().clone())
    }

    /// `ZRANGE index_key 0 -1 WITHSCORES`: ascending by score, then member.
    #[must_use]
    pub fn members(&self, index_key: &str) -> Vec<(String, f64)> {
        let mut members: Vec<(String, f64)> = self
            .indexes
            .get(index_key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        members
    }

    #[must_use]
    pub fn contains_member(&self, index_key: &str, member: &str) -> bool {
        self.indexes
            .get(index_key)
            .is_some_and(|set| set.contains_key(member))
    }

    /// Number of cached values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.indexes.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
        self.indexes.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValueCache for InMemoryStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

#[async_trait]
impl EnvironmentIndex for InMemoryStore {
    async fn add(&self, index_key: &str, member: &str, score: f64) -> Result<(), StorageError> {
        self.indexes
            .entry(index_key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn remove(&self, index_key: &str, member: &str) -> Result<(), StorageError> {
        // Redis drops a sorted set once its last member goes
        self.indexes.remove_if_mut(index_key, |_, set| {
            set.remove(member);
            set.is_empty()
        });
        Ok(())
    }
}
