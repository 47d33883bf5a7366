// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The storage collaborator the core consumes. The core only
//! ever talks to this trait; Cassandra DAOs, etcd, sled, or anything else
//! sit behind an implementation outside this crate, splitting a raw KV
//! backend from the typed state built on top of it.

use crate::error::{PelotonError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Upper bound on the number of rows a single batch operation may touch
/// (e.g. 1000 rows).
pub const MAX_BATCH: usize = 1000;

pub type Key = String;
pub type Value = Vec<u8>;

/// A predicate over stored values, used by `Store::query`. Implementations
/// may translate this into a native index lookup (owner/labels/keywords);
/// the in-memory store below applies it as a linear scan.
pub type Predicate = Arc<dyn Fn(&Key, &Value) -> bool + Send + Sync>;

/// The result of a batch write: how many rows succeeded and, for any
/// failures, the keys that failed. Callers retry only the failed subset.
#[derive(Debug, Default, Clone)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: Vec<(Key, String)>,
}

impl BatchResult {
    pub fn is_full_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Key-value/columnar storage interface. All operations are async since a
/// real backend suspends; callers must not hold a component lock across a
/// `Store` call.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(&self, key: &Key, value: Value, if_not_exist: bool) -> Result<()>;
    async fn update(&self, key: &Key, patch: Value) -> Result<()>;
    async fn get(&self, key: &Key) -> Result<Option<Value>>;
    async fn query(&self, predicate: Predicate) -> Result<Vec<(Key, Value)>>;
    async fn delete(&self, key: &Key) -> Result<()>;

    async fn batch_create(&self, items: Vec<(Key, Value)>) -> Result<BatchResult> {
        if items.len() > MAX_BATCH {
            return Err(PelotonError::InvalidArgument(format!(
                "batch of {} exceeds max batch size {}",
                items.len(),
                MAX_BATCH
            )));
        }
        let mut result = BatchResult::default();
        for (key, value) in items {
            match self.create(&key, value, true).await {
                Ok(()) => result.succeeded += 1,
                Err(e) => result.failed.push((key, e.to_string())),
            }
        }
        Ok(result)
    }

    async fn batch_delete(&self, keys: Vec<Key>) -> Result<BatchResult> {
        if keys.len() > MAX_BATCH {
            return Err(PelotonError::InvalidArgument(format!(
                "batch of {} exceeds max batch size {}",
                keys.len(),
                MAX_BATCH
            )));
        }
        let mut result = BatchResult::default();
        for key in keys {
            match self.delete(&key).await {
                Ok(()) => result.succeeded += 1,
                Err(e) => result.failed.push((key, e.to_string())),
            }
        }
        Ok(result)
    }
}

/// In-memory `Store` implementation: used in tests and as the default
/// backend when no durable store is configured.
#[derive(Default)]
pub struct MemStore {
    rows: RwLock<HashMap<Key, Value>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create(&self, key: &Key, value: Value, if_not_exist: bool) -> Result<()> {
        let mut rows = self.rows.write().await;
        if if_not_exist && rows.contains_key(key) {
            return Err(PelotonError::AlreadyExists(key.clone()));
        }
        rows.insert(key.clone(), value);
        Ok(())
    }

    async fn update(&self, key: &Key, patch: Value) -> Result<()> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(key) {
            return Err(PelotonError::NotFound(key.clone()));
        }
        rows.insert(key.clone(), patch);
        Ok(())
    }

    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn query(&self, predicate: Predicate) -> Result<Vec<(Key, Value)>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|(k, v)| predicate(k, v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        self.rows.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_if_not_exist_rejects_duplicates() {
        let store = MemStore::new();
        store
            .create(&"k".to_string(), vec![1], true)
            .await
            .unwrap();
        let err = store
            .create(&"k".to_string(), vec![2], true)
            .await
            .unwrap_err();
        assert!(matches!(err, PelotonError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_requires_existing_key() {
        let store = MemStore::new();
        let err = store.update(&"missing".to_string(), vec![1]).await.unwrap_err();
        assert!(matches!(err, PelotonError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemStore::new();
        store.delete(&"missing".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn batch_over_limit_is_rejected() {
        let store = MemStore::new();
        let items: Vec<_> = (0..MAX_BATCH + 1)
            .map(|i| (format!("k{i}"), vec![0u8]))
            .collect();
        let err = store.batch_create(items).await.unwrap_err();
        assert!(matches!(err, PelotonError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn query_applies_predicate() {
        let store = MemStore::new();
        store.create(&"a".to_string(), vec![1], true).await.unwrap();
        store.create(&"b".to_string(), vec![2], true).await.unwrap();
        let pred: Predicate = Arc::new(|k: &Key, _v: &Value| k == "a");
        let rows = store.query(pred).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "a");
    }
}
