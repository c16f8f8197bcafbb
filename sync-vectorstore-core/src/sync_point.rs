// Copyright 2026 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-query sync points.
//!
//! A sync point is the highest change event sequence durably applied to the
//! vector store for a `(reaction, query)` pair. It is created once by
//! bootstrap and afterwards only moved forward by
//! [`SyncPointManager::try_update_sync_point`].
//!
//! Two managers are provided:
//! - [`StateStoreSyncPointManager`] persists records through a
//!   [`StateStoreProvider`] and commits with a compare-and-swap.
//! - [`CollectionSyncPointManager`] keeps records as documents in a
//!   per-reaction metadata collection of the vector store and serializes
//!   commits with a lock.

use crate::config::QueryConfig;
use crate::document::VectorDocument;
use crate::state_store::{StateStoreProvider, StateStoreResult};
use crate::store::{VectorCollection, VectorStoreService};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// State store partition holding sync point records.
pub const SYNC_POINT_STORE_ID: &str = "drasi-sync-points";

pub const SYNC_POINT_KEY_PREFIX: &str = "sync_";

pub const METADATA_COLLECTION_PREFIX: &str = "_drasi_metadata_";

const RECORD_VERSION: &str = "1.0";

/// Key of the bookkeeping document for `query_id`.
///
/// Result rows carrying this key are never written as user documents.
pub fn sync_point_key(query_id: &str) -> String {
    format!("{SYNC_POINT_KEY_PREFIX}{query_id}")
}

pub fn metadata_collection_name(reaction_name: &str) -> String {
    format!("{METADATA_COLLECTION_PREFIX}{reaction_name}")
}

/// Persisted form of a sync point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPointRecord {
    pub reaction_name: String,
    pub query_id: String,
    pub sequence: u64,
    pub last_updated: DateTime<Utc>,
    /// Number of commits since the sync point was created
    pub processed_count: u64,
    pub version: String,
}

impl SyncPointRecord {
    pub fn new(reaction_name: &str, query_id: &str, sequence: u64) -> Self {
        Self {
            reaction_name: reaction_name.to_string(),
            query_id: query_id.to_string(),
            sequence,
            last_updated: Utc::now(),
            processed_count: 0,
            version: RECORD_VERSION.to_string(),
        }
    }

    /// The record that results from committing `sequence` on top of `self`.
    pub fn advanced(&self, sequence: u64) -> Self {
        Self {
            sequence,
            last_updated: Utc::now(),
            processed_count: self.processed_count + 1,
            ..self.clone()
        }
    }

    pub fn is_older_than(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.last_updated > max_age
    }
}

/// Storage for per-query sync points.
#[async_trait]
pub trait SyncPointManager: Send + Sync {
    /// Prepare backing storage. Called once before any other method.
    async fn initialize_storage(&self) -> Result<()> {
        Ok(())
    }

    async fn get_sync_point_record(
        &self,
        reaction_name: &str,
        query_id: &str,
    ) -> Result<Option<SyncPointRecord>>;

    async fn get_sync_point(&self, reaction_name: &str, query_id: &str) -> Result<Option<u64>> {
        Ok(self
            .get_sync_point_record(reaction_name, query_id)
            .await?
            .map(|r| r.sequence))
    }

    /// Advance the sync point to `sequence`.
    ///
    /// # Returns
    /// * `Ok(true)` - The stored value now is at least `sequence`. If it was
    ///   already `>= sequence` nothing is written.
    /// * `Ok(false)` - A concurrent writer changed the value first, or the
    ///   sync point no longer exists
    /// * `Err(e)` - The store could not be read or written
    async fn try_update_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        sequence: u64,
    ) -> Result<bool>;

    /// Create the sync point with `initial_sequence` unless one already
    /// exists. An existing value is never overwritten.
    ///
    /// Returns `true` when a sync point exists afterwards.
    async fn initialize_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        initial_sequence: u64,
    ) -> Result<bool>;

    /// Returns `true` if a sync point existed.
    async fn delete_sync_point(&self, reaction_name: &str, query_id: &str) -> Result<bool>;

    /// See [`sync_point_key`].
    fn sync_point_key(&self, query_id: &str) -> String {
        sync_point_key(query_id)
    }
}

/// Sync points persisted through a [`StateStoreProvider`].
///
/// Records are stored as JSON under `{reaction}:{query}` in the
/// [`SYNC_POINT_STORE_ID`] partition. Durability follows the provider.
pub struct StateStoreSyncPointManager {
    store: Arc<dyn StateStoreProvider>,
}

impl StateStoreSyncPointManager {
    pub fn new(store: Arc<dyn StateStoreProvider>) -> Self {
        Self { store }
    }

    fn key(reaction_name: &str, query_id: &str) -> String {
        format!("{reaction_name}:{query_id}")
    }

    async fn read(&self, key: &str) -> Result<Option<(Vec<u8>, SyncPointRecord)>> {
        let Some(bytes) = self
            .store
            .get(SYNC_POINT_STORE_ID, key)
            .await
            .with_context(|| format!("Failed to read sync point '{key}'"))?
        else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt sync point record '{key}'"))?;
        Ok(Some((bytes, record)))
    }

    /// Delete every sync point of `reaction_name` that has not been updated
    /// within `max_age` and whose query `keep` rejects.
    ///
    /// Returns the ids of the removed queries.
    pub async fn purge_expired<F>(
        &self,
        reaction_name: &str,
        max_age: chrono::Duration,
        keep: F,
    ) -> Result<Vec<String>>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let prefix = format!("{reaction_name}:");
        let keys: Vec<String> = self
            .store
            .list_keys(SYNC_POINT_STORE_ID)
            .await
            .context("Failed to list sync points")?
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .collect();

        let mut removed = Vec::new();
        for key in keys {
            let Some((_, record)) = self.read(&key).await? else {
                continue;
            };
            if keep(&record.query_id) || !record.is_older_than(max_age) {
                continue;
            }
            if self
                .store
                .delete(SYNC_POINT_STORE_ID, &key)
                .await
                .with_context(|| format!("Failed to delete sync point '{key}'"))?
            {
                info!(
                    "[{reaction_name}] Purged expired sync point for query {} (last updated {})",
                    record.query_id, record.last_updated
                );
                removed.push(record.query_id);
            }
        }
        Ok(removed)
    }

    pub async fn sync(&self) -> StateStoreResult<()> {
        self.store.sync().await
    }
}

#[async_trait]
impl SyncPointManager for StateStoreSyncPointManager {
    async fn get_sync_point_record(
        &self,
        reaction_name: &str,
        query_id: &str,
    ) -> Result<Option<SyncPointRecord>> {
        let key = Self::key(reaction_name, query_id);
        Ok(self.read(&key).await?.map(|(_, record)| record))
    }

    async fn try_update_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        sequence: u64,
    ) -> Result<bool> {
        let key = Self::key(reaction_name, query_id);
        let Some((current_bytes, current)) = self.read(&key).await? else {
            warn!("[{reaction_name}] Sync point for query {query_id} disappeared before commit");
            return Ok(false);
        };

        if current.sequence >= sequence {
            debug!(
                "[{reaction_name}] Sync point for query {query_id} already at {} (>= {sequence})",
                current.sequence
            );
            return Ok(true);
        }

        let next = serde_json::to_vec(&current.advanced(sequence))
            .context("Failed to serialize sync point record")?;
        let swapped = self
            .store
            .compare_and_swap(SYNC_POINT_STORE_ID, &key, Some(&current_bytes), next)
            .await
            .with_context(|| format!("Failed to write sync point '{key}'"))?;

        if swapped {
            debug!("[{reaction_name}] Sync point for query {query_id} advanced to {sequence}");
        } else {
            warn!(
                "[{reaction_name}] Concurrent update detected on sync point for query {query_id}"
            );
        }
        Ok(swapped)
    }

    async fn initialize_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        initial_sequence: u64,
    ) -> Result<bool> {
        let key = Self::key(reaction_name, query_id);
        let record = serde_json::to_vec(&SyncPointRecord::new(
            reaction_name,
            query_id,
            initial_sequence,
        ))
        .context("Failed to serialize sync point record")?;

        let created = self
            .store
            .compare_and_swap(SYNC_POINT_STORE_ID, &key, None, record)
            .await
            .with_context(|| format!("Failed to create sync point '{key}'"))?;

        if created {
            info!(
                "[{reaction_name}] Initialized sync point for query {query_id} to sequence {initial_sequence}"
            );
        } else {
            debug!("[{reaction_name}] Sync point already exists for query {query_id}");
        }
        Ok(true)
    }

    async fn delete_sync_point(&self, reaction_name: &str, query_id: &str) -> Result<bool> {
        let key = Self::key(reaction_name, query_id);
        let existed = self
            .store
            .delete(SYNC_POINT_STORE_ID, &key)
            .await
            .with_context(|| format!("Failed to delete sync point '{key}'"))?;
        if existed {
            info!("[{reaction_name}] Deleted sync point for query {query_id}");
        }
        Ok(existed)
    }
}

/// Sync points stored in the vector store itself.
///
/// Each reaction owns the metadata collection `_drasi_metadata_{reaction}`
/// holding one document per query, keyed by [`sync_point_key`]. Reads go
/// through a cache. Writes are serialized by a single lock and re-read the
/// stored record before writing, which makes the commit a lock-based
/// compare-and-swap within this process.
pub struct CollectionSyncPointManager {
    service: Arc<VectorStoreService>,
    reaction_name: String,
    metadata: RwLock<Option<Arc<dyn VectorCollection>>>,
    cache: RwLock<HashMap<String, u64>>,
    write_lock: Mutex<()>,
}

impl CollectionSyncPointManager {
    pub fn new(service: Arc<VectorStoreService>, reaction_name: impl Into<String>) -> Self {
        Self {
            service,
            reaction_name: reaction_name.into(),
            metadata: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn collection_name(&self) -> String {
        metadata_collection_name(&self.reaction_name)
    }

    /// Open or create the metadata collection. Must be called before any
    /// other operation.
    pub async fn initialize(&self) -> Result<()> {
        let name = self.collection_name();
        info!(
            "[{}] Initializing metadata collection {name}",
            self.reaction_name
        );
        let config = QueryConfig::new(name.clone(), "key", "{{content}}");
        let collection = self
            .service
            .get_or_create_collection(&config)
            .await
            .with_context(|| format!("Failed to initialize metadata collection {name}"))?;
        *self.metadata.write().await = Some(collection);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.metadata.read().await.is_some()
    }

    async fn collection(&self) -> Result<Arc<dyn VectorCollection>> {
        self.metadata.read().await.clone().ok_or_else(|| {
            anyhow::anyhow!("Metadata collection not initialized. Call initialize() first.")
        })
    }

    fn cache_key(reaction_name: &str, query_id: &str) -> String {
        format!("{reaction_name}::{query_id}")
    }

    async fn load(
        &self,
        collection: &dyn VectorCollection,
        query_id: &str,
    ) -> Result<Option<SyncPointRecord>> {
        let key = sync_point_key(query_id);
        let Some(document) = collection
            .get(&key)
            .await
            .with_context(|| format!("Failed to read sync point document '{key}'"))?
        else {
            return Ok(None);
        };
        let record = serde_json::from_str(&document.content)
            .with_context(|| format!("Corrupt sync point document '{key}'"))?;
        Ok(Some(record))
    }

    fn to_document(&self, record: &SyncPointRecord) -> Result<VectorDocument> {
        let content =
            serde_json::to_string(record).context("Failed to serialize sync point record")?;
        let metadata = serde_json::to_value(record)?;

        // Collections have a fixed dimensionality, so carry a unit vector of it.
        let mut vector = vec![0.0; self.service.settings().embedding_dimensions.max(1)];
        vector[0] = 1.0;

        let mut document = VectorDocument::new(sync_point_key(&record.query_id), content, vector)
            .with_metadata(metadata);
        document.title = Some(format!(
            "Sync Point - Reaction: {}, Query: {}",
            record.reaction_name, record.query_id
        ));
        document.source = "drasi-sync-metadata".to_string();
        Ok(document)
    }

    async fn write(
        &self,
        collection: &dyn VectorCollection,
        record: &SyncPointRecord,
    ) -> Result<()> {
        let document = self.to_document(record)?;
        collection.upsert(&[document]).await.with_context(|| {
            format!("Failed to write sync point for query {}", record.query_id)
        })?;
        self.cache.write().await.insert(
            Self::cache_key(&record.reaction_name, &record.query_id),
            record.sequence,
        );
        Ok(())
    }
}

#[async_trait]
impl SyncPointManager for CollectionSyncPointManager {
    async fn initialize_storage(&self) -> Result<()> {
        self.initialize().await
    }

    async fn get_sync_point_record(
        &self,
        reaction_name: &str,
        query_id: &str,
    ) -> Result<Option<SyncPointRecord>> {
        let collection = self.collection().await?;
        let record = self.load(collection.as_ref(), query_id).await?;
        let cache_key = Self::cache_key(reaction_name, query_id);
        match &record {
            Some(r) => {
                self.cache.write().await.insert(cache_key, r.sequence);
            }
            None => {
                self.cache.write().await.remove(&cache_key);
            }
        }
        Ok(record)
    }

    async fn get_sync_point(&self, reaction_name: &str, query_id: &str) -> Result<Option<u64>> {
        let collection = self.collection().await?;
        let cache_key = Self::cache_key(reaction_name, query_id);
        if let Some(sequence) = self.cache.read().await.get(&cache_key) {
            return Ok(Some(*sequence));
        }

        let record = self.load(collection.as_ref(), query_id).await?;
        if let Some(r) = &record {
            debug!(
                "[{reaction_name}] Loaded sync point for query {query_id}: {}",
                r.sequence
            );
            self.cache.write().await.insert(cache_key, r.sequence);
        }
        Ok(record.map(|r| r.sequence))
    }

    async fn try_update_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        sequence: u64,
    ) -> Result<bool> {
        let collection = self.collection().await?;
        let _guard = self.write_lock.lock().await;

        let Some(current) = self.load(collection.as_ref(), query_id).await? else {
            warn!("[{reaction_name}] Sync point for query {query_id} disappeared before commit");
            self.cache
                .write()
                .await
                .remove(&Self::cache_key(reaction_name, query_id));
            return Ok(false);
        };
        if current.sequence >= sequence {
            return Ok(true);
        }

        self.write(collection.as_ref(), &current.advanced(sequence))
            .await?;
        debug!("[{reaction_name}] Sync point for query {query_id} advanced to {sequence}");
        Ok(true)
    }

    async fn initialize_sync_point(
        &self,
        reaction_name: &str,
        query_id: &str,
        initial_sequence: u64,
    ) -> Result<bool> {
        let collection = self.collection().await?;
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.load(collection.as_ref(), query_id).await? {
            debug!(
                "[{reaction_name}] Sync point already exists for query {query_id}: {}",
                existing.sequence
            );
            return Ok(true);
        }

        let record = SyncPointRecord::new(reaction_name, query_id, initial_sequence);
        self.write(collection.as_ref(), &record).await?;
        info!(
            "[{reaction_name}] Initialized sync point for query {query_id} to sequence {initial_sequence}"
        );
        Ok(true)
    }

    async fn delete_sync_point(&self, reaction_name: &str, query_id: &str) -> Result<bool> {
        let collection = self.collection().await?;
        let _guard = self.write_lock.lock().await;

        let existed = self.load(collection.as_ref(), query_id).await?.is_some();
        collection
            .delete(&[sync_point_key(query_id)])
            .await
            .with_context(|| format!("Failed to delete sync point for query {query_id}"))?;
        self.cache
            .write()
            .await
            .remove(&Self::cache_key(reaction_name, query_id));
        if existed {
            info!("[{reaction_name}] Deleted sync point for query {query_id}");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorStoreSettings;
    use crate::state_store::MemoryStateStoreProvider;
    use crate::store::InMemoryVectorStoreAdapter;
    use crate::store::VectorStoreAdapter;

    const REACTION: &str = "test-reaction";

    fn state_manager() -> (Arc<MemoryStateStoreProvider>, StateStoreSyncPointManager) {
        let store = Arc::new(MemoryStateStoreProvider::new());
        (store.clone(), StateStoreSyncPointManager::new(store))
    }

    async fn collection_manager() -> (Arc<InMemoryVectorStoreAdapter>, CollectionSyncPointManager) {
        let adapter = Arc::new(InMemoryVectorStoreAdapter::new());
        let service = Arc::new(VectorStoreService::new(
            adapter.clone(),
            VectorStoreSettings::with_dimensions(4),
        ));
        let manager = CollectionSyncPointManager::new(service, REACTION);
        manager.initialize().await.unwrap();
        (adapter, manager)
    }

    #[test]
    fn test_keys() {
        assert_eq!(sync_point_key("q1"), "sync_q1");
        assert_eq!(metadata_collection_name("r"), "_drasi_metadata_r");
        assert_eq!(StateStoreSyncPointManager::key("r", "q"), "r:q");
    }

    #[test]
    fn test_record_wire_format() {
        let record = SyncPointRecord::new("r", "q", 7);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["reactionName"], "r");
        assert_eq!(json["queryId"], "q");
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["processedCount"], 0);
        assert_eq!(json["version"], "1.0");
        assert!(json["lastUpdated"].is_string());

        let next = record.advanced(9);
        assert_eq!(next.sequence, 9);
        assert_eq!(next.processed_count, 1);
    }

    #[tokio::test]
    async fn test_state_store_missing_sync_point() {
        let (_, manager) = state_manager();
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), None);
        assert!(!manager.try_update_sync_point(REACTION, "q1", 5).await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_store_initialize_never_overwrites() {
        let (_, manager) = state_manager();
        assert!(manager.initialize_sync_point(REACTION, "q1", 10).await.unwrap());
        assert!(manager.initialize_sync_point(REACTION, "q1", 50).await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_state_store_update_is_monotonic() {
        let (_, manager) = state_manager();
        manager.initialize_sync_point(REACTION, "q1", 10).await.unwrap();

        assert!(manager.try_update_sync_point(REACTION, "q1", 15).await.unwrap());
        // Stale and equal commits succeed without lowering the value.
        assert!(manager.try_update_sync_point(REACTION, "q1", 12).await.unwrap());
        assert!(manager.try_update_sync_point(REACTION, "q1", 15).await.unwrap());

        let record = manager
            .get_sync_point_record(REACTION, "q1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sequence, 15);
        assert_eq!(record.processed_count, 1);
    }

    #[tokio::test]
    async fn test_state_store_concurrent_commits_single_winner() {
        let (_, manager) = state_manager();
        let manager = Arc::new(manager);
        manager.initialize_sync_point(REACTION, "q1", 0).await.unwrap();

        let mut handles = Vec::new();
        for sequence in 1..=6u64 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .try_update_sync_point(REACTION, "q1", sequence)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever interleaving happened, the stored value is one of the
        // proposed sequences and every recorded commit advanced it.
        let record = manager
            .get_sync_point_record(REACTION, "q1")
            .await
            .unwrap()
            .unwrap();
        assert!((1..=6).contains(&record.sequence));
        assert!(record.processed_count >= 1);
    }

    #[tokio::test]
    async fn test_state_store_corrupt_record_is_error() {
        let (store, manager) = state_manager();
        store
            .set(SYNC_POINT_STORE_ID, "test-reaction:q1", b"not json".to_vec())
            .await
            .unwrap();
        assert!(manager.get_sync_point(REACTION, "q1").await.is_err());
        assert!(manager.try_update_sync_point(REACTION, "q1", 2).await.is_err());
    }

    #[tokio::test]
    async fn test_state_store_delete() {
        let (_, manager) = state_manager();
        manager.initialize_sync_point(REACTION, "q1", 3).await.unwrap();
        assert!(manager.delete_sync_point(REACTION, "q1").await.unwrap());
        assert!(!manager.delete_sync_point(REACTION, "q1").await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, manager) = state_manager();
        let mut old = SyncPointRecord::new(REACTION, "old", 1);
        old.last_updated = Utc::now() - chrono::Duration::days(30);
        store
            .set(
                SYNC_POINT_STORE_ID,
                "test-reaction:old",
                serde_json::to_vec(&old).unwrap(),
            )
            .await
            .unwrap();
        let mut kept = old.clone();
        kept.query_id = "kept".to_string();
        store
            .set(
                SYNC_POINT_STORE_ID,
                "test-reaction:kept",
                serde_json::to_vec(&kept).unwrap(),
            )
            .await
            .unwrap();
        manager.initialize_sync_point(REACTION, "fresh", 1).await.unwrap();
        manager.initialize_sync_point("other", "old", 1).await.unwrap();

        let removed = manager
            .purge_expired(REACTION, chrono::Duration::days(7), |q| q == "kept")
            .await
            .unwrap();

        assert_eq!(removed, vec!["old".to_string()]);
        assert!(manager.get_sync_point(REACTION, "kept").await.unwrap().is_some());
        assert!(manager.get_sync_point(REACTION, "fresh").await.unwrap().is_some());
        assert!(manager.get_sync_point("other", "old").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_collection_manager_requires_initialize() {
        let adapter = Arc::new(InMemoryVectorStoreAdapter::new());
        let service = Arc::new(VectorStoreService::new(
            adapter,
            VectorStoreSettings::with_dimensions(4),
        ));
        let manager = CollectionSyncPointManager::new(service, REACTION);

        assert!(!manager.is_initialized().await);
        let err = manager
            .get_sync_point(REACTION, "q1")
            .await
            .expect_err("uninitialized manager should fail");
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_collection_manager_lifecycle() {
        let (adapter, manager) = collection_manager().await;
        assert!(adapter
            .collection_exists("_drasi_metadata_test-reaction")
            .await
            .unwrap());

        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), None);
        assert!(manager.initialize_sync_point(REACTION, "q1", 10).await.unwrap());
        assert!(manager.initialize_sync_point(REACTION, "q1", 99).await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), Some(10));

        assert!(manager.try_update_sync_point(REACTION, "q1", 20).await.unwrap());
        assert!(manager.try_update_sync_point(REACTION, "q1", 5).await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), Some(20));

        let stored = adapter
            .collection("_drasi_metadata_test-reaction")
            .await
            .unwrap()
            .get("sync_q1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.source, "drasi-sync-metadata");
        assert_eq!(stored.vector.len(), 4);
        let record: SyncPointRecord = serde_json::from_str(&stored.content).unwrap();
        assert_eq!(record.sequence, 20);
        assert_eq!(record.processed_count, 1);

        assert!(manager.delete_sync_point(REACTION, "q1").await.unwrap());
        assert_eq!(manager.get_sync_point(REACTION, "q1").await.unwrap(), None);
        assert!(!manager.try_update_sync_point(REACTION, "q1", 30).await.unwrap());
    }

    #[tokio::test]
    async fn test_collection_manager_survives_new_instance() {
        let (adapter, manager) = collection_manager().await;
        manager.initialize_sync_point(REACTION, "q1", 42).await.unwrap();

        let service = Arc::new(VectorStoreService::new(
            adapter,
            VectorStoreSettings::with_dimensions(4),
        ));
        let restarted = CollectionSyncPointManager::new(service, REACTION);
        restarted.initialize().await.unwrap();
        assert_eq!(restarted.get_sync_point(REACTION, "q1").await.unwrap(), Some(42));
    }
}
