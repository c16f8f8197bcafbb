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

//! The sync vector store reaction host.
//!
//! Owns the pipeline components built from configuration, bootstraps every
//! configured query on start, and dispatches change events to the
//! [`ChangeEventHandler`] one at a time per query.

use crate::clients::{HttpManagementClient, HttpResultViewClient};
use crate::config::SyncVectorStoreReactionConfig;
use crate::factory;
use anyhow::{Context, Result};
use drasi_sync_vectorstore_core::{
    BootstrapOutcome, ChangeEvent, ChangeEventHandler, DocumentProcessor, Embedder,
    HandleOutcome, ManagementClient, QueryConfig, QueryInitializationService, ResultViewClient,
    StateStoreProvider, StateStoreSyncPointManager, SyncError, SyncPointManager,
    VectorStoreAdapter, VectorStoreService,
};
use log::{error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

impl fmt::Display for ReactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReactionStatus::Stopped => "Stopped",
            ReactionStatus::Starting => "Starting",
            ReactionStatus::Running => "Running",
            ReactionStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Reaction that keeps vector store collections in sync with continuous
/// query results.
pub struct SyncVectorStoreReaction {
    name: String,
    config: SyncVectorStoreReactionConfig,
    status: RwLock<ReactionStatus>,
    queries: RwLock<BTreeMap<String, QueryConfig>>,
    query_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    store: Arc<VectorStoreService>,
    sync_points: Arc<dyn SyncPointManager>,
    state_store: Option<Arc<dyn StateStoreProvider>>,
    handler: ChangeEventHandler,
    initializer: QueryInitializationService,
}

impl SyncVectorStoreReaction {
    pub fn builder(name: impl Into<String>) -> SyncVectorStoreReactionBuilder {
        SyncVectorStoreReactionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SyncVectorStoreReactionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<VectorStoreService> {
        &self.store
    }

    pub fn sync_points(&self) -> &Arc<dyn SyncPointManager> {
        &self.sync_points
    }

    pub async fn status(&self) -> ReactionStatus {
        *self.status.read().await
    }

    pub async fn query_ids(&self) -> Vec<String> {
        self.queries.read().await.keys().cloned().collect()
    }

    async fn set_status(&self, status: ReactionStatus) {
        *self.status.write().await = status;
    }

    /// Bootstrap every configured query and start accepting change events.
    ///
    /// On failure the reaction moves to [`ReactionStatus::Error`] and keeps
    /// rejecting events.
    pub async fn start(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, BootstrapOutcome>> {
        {
            let mut status = self.status.write().await;
            if matches!(*status, ReactionStatus::Starting | ReactionStatus::Running) {
                anyhow::bail!("Reaction '{}' is already {}", self.name, *status);
            }
            *status = ReactionStatus::Starting;
        }

        let queries = self.queries.read().await.clone();
        info!(
            "[{}] Starting sync vector store reaction with {} queries on {} store",
            self.name,
            queries.len(),
            self.store.adapter().store_type()
        );

        match self.purge_orphaned_sync_points(&queries).await {
            Ok(purged) if !purged.is_empty() => info!(
                "[{}] Purged {} expired sync points of unconfigured queries",
                self.name,
                purged.len()
            ),
            Ok(_) => {}
            Err(e) => warn!("[{}] Failed to purge expired sync points: {e:#}", self.name),
        }

        match self.initializer.initialize_queries(&queries, cancel).await {
            Ok(outcomes) => {
                self.set_status(ReactionStatus::Running).await;
                info!("[{}] Sync vector store reaction is running", self.name);
                Ok(outcomes)
            }
            Err(e) => {
                self.set_status(ReactionStatus::Error).await;
                error!("[{}] Failed to start reaction: {e:#}", self.name);
                Err(e)
            }
        }
    }

    /// Delete state store sync points of queries that are no longer
    /// configured and have not been updated within the longest
    /// `syncPointRetentionDays` of the configured queries.
    ///
    /// Nothing is purged when no query sets a retention window or sync points
    /// live in the vector store.
    async fn purge_orphaned_sync_points(
        &self,
        queries: &BTreeMap<String, QueryConfig>,
    ) -> Result<Vec<String>> {
        let Some(state_store) = &self.state_store else {
            return Ok(Vec::new());
        };
        let Some(days) = queries
            .values()
            .filter_map(|q| q.sync_point_retention_days)
            .max()
        else {
            return Ok(Vec::new());
        };

        StateStoreSyncPointManager::new(state_store.clone())
            .purge_expired(&self.name, chrono::Duration::days(days.into()), |query_id| {
                queries.contains_key(query_id)
            })
            .await
    }

    /// Stop accepting change events and flush the sync point store.
    pub async fn stop(&self) -> Result<()> {
        self.set_status(ReactionStatus::Stopped).await;
        if let Some(state_store) = &self.state_store {
            state_store
                .sync()
                .await
                .context("Failed to flush sync point store")?;
        }
        info!("[{}] Sync vector store reaction stopped", self.name);
        Ok(())
    }

    /// Apply one change event.
    ///
    /// Events for the same query are applied one at a time in arrival order.
    /// Events for different queries run concurrently. While the reaction is
    /// not running, events are rejected with the retryable
    /// [`SyncError::NotInitialized`].
    pub async fn handle(
        &self,
        event: &ChangeEvent,
        cancel: &CancellationToken,
    ) -> Result<HandleOutcome, SyncError> {
        let status = self.status().await;
        if status != ReactionStatus::Running {
            warn!(
                "[{}] Rejecting change event {} for query {}: reaction is {status}",
                self.name, event.sequence, event.query_id
            );
            return Err(SyncError::NotInitialized {
                query_id: event.query_id.clone(),
            });
        }

        let Some(config) = self.queries.read().await.get(&event.query_id).cloned() else {
            return self.handler.handle_change(event, None, cancel).await;
        };
        let lock = self.query_lock(&event.query_id).await;

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SyncError::Cancelled { phase: "awaiting query lock" });
            }
            guard = lock.lock() => guard,
        };

        self.handler
            .handle_change(event, Some(&config), cancel)
            .await
    }

    async fn query_lock(&self, query_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.query_locks.lock().await;
        locks
            .entry(query_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Stop syncing `query_id` and drop its sync point.
    ///
    /// Documents already written stay in the collection. Returns whether a
    /// sync point was removed.
    pub async fn retire_query(&self, query_id: &str) -> Result<bool> {
        let lock = self.query_lock(query_id).await;
        let _guard = lock.lock().await;

        self.queries.write().await.remove(query_id);
        let removed = self
            .sync_points
            .delete_sync_point(&self.name, query_id)
            .await
            .with_context(|| format!("Failed to delete sync point for query {query_id}"))?;
        self.query_locks.lock().await.remove(query_id);

        info!("[{}] Retired query {query_id}", self.name);
        Ok(removed)
    }
}

/// Builder for [`SyncVectorStoreReaction`].
///
/// Backends not supplied explicitly are created from the configuration.
pub struct SyncVectorStoreReactionBuilder {
    name: String,
    config: Option<SyncVectorStoreReactionConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    store_adapter: Option<Arc<dyn VectorStoreAdapter>>,
    state_store: Option<Arc<dyn StateStoreProvider>>,
    result_view: Option<Arc<dyn ResultViewClient>>,
    management: Option<Arc<dyn ManagementClient>>,
}

impl SyncVectorStoreReactionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            embedder: None,
            store_adapter: None,
            state_store: None,
            result_view: None,
            management: None,
        }
    }

    pub fn with_config(mut self, config: SyncVectorStoreReactionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom embedder (overrides config-based embedder).
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_store_adapter(mut self, adapter: Arc<dyn VectorStoreAdapter>) -> Self {
        self.store_adapter = Some(adapter);
        self
    }

    /// Keep sync points in `state_store` regardless of the configured backend.
    pub fn with_state_store(mut self, state_store: Arc<dyn StateStoreProvider>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    pub fn with_result_view_client(mut self, client: Arc<dyn ResultViewClient>) -> Self {
        self.result_view = Some(client);
        self
    }

    pub fn with_management_client(mut self, client: Arc<dyn ManagementClient>) -> Self {
        self.management = Some(client);
        self
    }

    pub fn build(self) -> Result<SyncVectorStoreReaction> {
        let mut config = self
            .config
            .unwrap_or_else(|| SyncVectorStoreReactionConfig::new(self.name.clone()));
        config.reaction_name = self.name.clone();
        config
            .validate()
            .with_context(|| format!("Invalid configuration for reaction '{}'", self.name))?;

        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => factory::create_embedder(&config.embedding),
        };
        if embedder.dimensions() != config.vector_store.embedding_dimensions {
            anyhow::bail!(
                "Embedding dimensions ({}) do not match vector store embedding dimensions ({})",
                embedder.dimensions(),
                config.vector_store.embedding_dimensions
            );
        }

        let adapter = match self.store_adapter {
            Some(adapter) => adapter,
            None => factory::create_store_adapter(&config.store)?,
        };
        let state_store = match self.state_store {
            Some(state_store) => Some(state_store),
            None => factory::create_state_store(&config.sync_points)?,
        };

        let store = Arc::new(VectorStoreService::new(adapter, config.vector_store.clone()));
        let processor = Arc::new(
            DocumentProcessor::new(embedder).with_embedding_batch_size(config.embedding_batch_size),
        );
        let sync_points =
            factory::create_sync_point_manager(&self.name, store.clone(), state_store.clone());

        let result_view: Arc<dyn ResultViewClient> = match self.result_view {
            Some(client) => client,
            None => Arc::new(HttpResultViewClient::new(&config.query_container_id)),
        };
        let management: Arc<dyn ManagementClient> = match self.management {
            Some(client) => client,
            None => Arc::new(HttpManagementClient::new(
                config.management_api_base_url.clone(),
            )),
        };

        let handler = ChangeEventHandler::new(
            self.name.clone(),
            store.clone(),
            processor.clone(),
            sync_points.clone(),
        );
        let initializer = QueryInitializationService::new(
            self.name.clone(),
            store.clone(),
            processor,
            sync_points.clone(),
            result_view,
            management,
        )
        .with_wait_for_ready_seconds(config.wait_for_query_ready_seconds);

        Ok(SyncVectorStoreReaction {
            name: self.name,
            queries: RwLock::new(config.queries.clone()),
            config,
            status: RwLock::new(ReactionStatus::Stopped),
            query_locks: Mutex::new(HashMap::new()),
            store,
            sync_points,
            state_store,
            handler,
            initializer,
        })
    }
}
