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

//! Recording test doubles for the sync pipeline.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use drasi_sync_vectorstore_core::{
    ManagementClient, ResultViewClient, SyncPointManager, SyncPointRecord, VectorCollection,
    VectorDocument, VectorStoreAdapter, VectorStoreSettings, ViewItem,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Ordered log of store and sync point calls shared by all doubles.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingCollection {
    name: String,
    log: CallLog,
    pub upserts: Mutex<Vec<Vec<VectorDocument>>>,
    pub deletes: Mutex<Vec<Vec<String>>>,
    pub fail_upsert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl RecordingCollection {
    pub fn upsert_calls(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }

    pub fn upserted_keys(&self) -> Vec<Vec<String>> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .map(|docs| docs.iter().map(|d| d.key.clone()).collect())
            .collect()
    }

    pub fn deleted_keys(&self) -> Vec<Vec<String>> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorCollection for RecordingCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, _key: &str) -> Result<Option<VectorDocument>> {
        Ok(None)
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        self.log.lock().unwrap().push("upsert".to_string());
        if self.fail_upsert.load(Ordering::SeqCst) {
            anyhow::bail!("injected upsert failure");
        }
        self.upserts.lock().unwrap().push(documents.to_vec());
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        self.log.lock().unwrap().push("delete".to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("injected delete failure");
        }
        self.deletes.lock().unwrap().push(keys.to_vec());
        Ok(())
    }
}

pub struct RecordingAdapter {
    pub collection: Arc<RecordingCollection>,
    pub opens: AtomicUsize,
}

impl RecordingAdapter {
    pub fn new(log: CallLog) -> Self {
        Self {
            collection: Arc::new(RecordingCollection {
                name: "items".to_string(),
                log,
                upserts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
                fail_upsert: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
            }),
            opens: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStoreAdapter for RecordingAdapter {
    fn store_type(&self) -> &str {
        "recording"
    }

    async fn get_or_create_collection(
        &self,
        _name: &str,
        _settings: &VectorStoreSettings,
        _create: bool,
    ) -> Result<Arc<dyn VectorCollection>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.collection.clone())
    }

    async fn collection_exists(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Sync point manager with a single stored value and scripted commit results.
pub struct ScriptedSyncPoints {
    log: CallLog,
    pub value: Mutex<Option<u64>>,
    pub updates: Mutex<Vec<u64>>,
    pub initializations: Mutex<Vec<u64>>,
    /// When set, `try_update_sync_point` reports a lost race.
    pub reject_updates: AtomicBool,
    pub fail_updates: AtomicBool,
}

impl ScriptedSyncPoints {
    pub fn new(log: CallLog, value: Option<u64>) -> Self {
        Self {
            log,
            value: Mutex::new(value),
            updates: Mutex::new(Vec::new()),
            initializations: Mutex::new(Vec::new()),
            reject_updates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Option<u64> {
        *self.value.lock().unwrap()
    }

    pub fn update_calls(&self) -> Vec<u64> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncPointManager for ScriptedSyncPoints {
    async fn get_sync_point_record(
        &self,
        reaction_name: &str,
        query_id: &str,
    ) -> Result<Option<SyncPointRecord>> {
        Ok(self
            .current()
            .map(|sequence| SyncPointRecord::new(reaction_name, query_id, sequence)))
    }

    async fn try_update_sync_point(
        &self,
        _reaction_name: &str,
        _query_id: &str,
        sequence: u64,
    ) -> Result<bool> {
        self.log.lock().unwrap().push("commit".to_string());
        self.updates.lock().unwrap().push(sequence);
        if self.fail_updates.load(Ordering::SeqCst) {
            anyhow::bail!("injected sync point store failure");
        }
        if self.reject_updates.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut value = self.value.lock().unwrap();
        *value = Some(value.map_or(sequence, |v| v.max(sequence)));
        Ok(true)
    }

    async fn initialize_sync_point(
        &self,
        _reaction_name: &str,
        _query_id: &str,
        initial_sequence: u64,
    ) -> Result<bool> {
        self.initializations.lock().unwrap().push(initial_sequence);
        let mut value = self.value.lock().unwrap();
        if value.is_none() {
            *value = Some(initial_sequence);
        }
        Ok(true)
    }

    async fn delete_sync_point(&self, _reaction_name: &str, _query_id: &str) -> Result<bool> {
        Ok(self.value.lock().unwrap().take().is_some())
    }
}

pub struct StaticResultView {
    pub items: Vec<ViewItem>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ResultViewClient for StaticResultView {
    async fn get_current_result(&self, _query_id: &str) -> Result<Vec<ViewItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

pub struct StaticManagement {
    pub ready: bool,
    pub calls: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl ManagementClient for StaticManagement {
    async fn wait_for_query_ready(&self, query_id: &str, timeout_seconds: u64) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((query_id.to_string(), timeout_seconds));
        Ok(self.ready)
    }
}
