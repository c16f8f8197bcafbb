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

//! Bootstrap of configured queries.
//!
//! Before change events for a query can be applied, its collection must be
//! seeded with the current result set and a sync point must be created at the
//! sequence that snapshot corresponds to. [`QueryInitializationService`] does
//! this once per query that has no sync point yet.

use crate::config::QueryConfig;
use crate::document::DocumentProcessor;
use crate::handler::without_reserved_rows;
use crate::store::VectorStoreService;
use crate::sync_point::SyncPointManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WAIT_FOR_QUERY_READY_SECONDS: u64 = 300;

/// One item of a query's result view stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<ViewHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewHeader {
    pub sequence: u64,
    #[serde(default)]
    pub timestamp: u64,
}

impl ViewItem {
    pub fn header(sequence: u64) -> Self {
        Self {
            header: Some(ViewHeader {
                sequence,
                timestamp: 0,
            }),
            data: None,
        }
    }

    pub fn data(data: Value) -> Self {
        Self {
            header: None,
            data: Some(data),
        }
    }
}

/// Source of a query's current result snapshot.
#[async_trait]
pub trait ResultViewClient: Send + Sync {
    /// The header item comes first, followed by one item per result row.
    async fn get_current_result(&self, query_id: &str) -> Result<Vec<ViewItem>>;
}

/// Query readiness checks against the management API.
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Block until `query_id` is ready or `timeout_seconds` pass.
    /// Returns `false` if the query did not become ready.
    async fn wait_for_query_ready(&self, query_id: &str, timeout_seconds: u64) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadyInitialized { sync_point: u64 },
    Bootstrapped { sync_point: u64, documents: usize },
}

pub struct QueryInitializationService {
    reaction_name: String,
    store: Arc<VectorStoreService>,
    processor: Arc<DocumentProcessor>,
    sync_points: Arc<dyn SyncPointManager>,
    result_view: Arc<dyn ResultViewClient>,
    management: Arc<dyn ManagementClient>,
    wait_for_ready_seconds: u64,
}

impl QueryInitializationService {
    pub fn new(
        reaction_name: impl Into<String>,
        store: Arc<VectorStoreService>,
        processor: Arc<DocumentProcessor>,
        sync_points: Arc<dyn SyncPointManager>,
        result_view: Arc<dyn ResultViewClient>,
        management: Arc<dyn ManagementClient>,
    ) -> Self {
        Self {
            reaction_name: reaction_name.into(),
            store,
            processor,
            sync_points,
            result_view,
            management,
            wait_for_ready_seconds: DEFAULT_WAIT_FOR_QUERY_READY_SECONDS,
        }
    }

    pub fn with_wait_for_ready_seconds(mut self, seconds: u64) -> Self {
        self.wait_for_ready_seconds = seconds;
        self
    }

    /// Validate, check dependencies and bootstrap every query in `queries`.
    ///
    /// Stops at the first query that fails.
    pub async fn initialize_queries(
        &self,
        queries: &BTreeMap<String, QueryConfig>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, BootstrapOutcome>> {
        info!(
            "[{}] Initializing vector store collections for {} queries",
            self.reaction_name,
            queries.len()
        );

        for (query_id, config) in queries {
            config
                .validate()
                .with_context(|| format!("Invalid configuration for query {query_id}"))?;
        }
        check_retention_collections(queries)?;

        self.test_store_connectivity().await?;
        self.test_embedding_service().await?;

        self.sync_points
            .initialize_storage()
            .await
            .context("Failed to initialize sync point storage")?;

        let mut outcomes = BTreeMap::new();
        for (query_id, config) in queries {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    anyhow::bail!("Initialization cancelled before query {query_id} completed")
                }
                outcome = self.initialize_query(query_id, config) => outcome
                    .with_context(|| format!("Failed to initialize query {query_id}"))?,
            };
            outcomes.insert(query_id.clone(), outcome);
        }

        info!("[{}] All queries initialized successfully", self.reaction_name);
        Ok(outcomes)
    }

    /// Bootstrap one query unless it already has a sync point.
    ///
    /// A sync point older than the query's retention window is discarded, the
    /// collection is emptied and the query is bootstrapped again.
    pub async fn initialize_query(
        &self,
        query_id: &str,
        config: &QueryConfig,
    ) -> Result<BootstrapOutcome> {
        info!(
            "[{}] Initializing collection '{}' for query {query_id}",
            self.reaction_name, config.collection_name
        );
        let mut collection = self.store.get_or_create_collection(config).await?;

        if let Some(record) = self
            .sync_points
            .get_sync_point_record(&self.reaction_name, query_id)
            .await?
        {
            let expired = config
                .sync_point_retention_days
                .is_some_and(|days| record.is_older_than(chrono::Duration::days(days.into())));
            if !expired {
                info!(
                    "[{}] Query {query_id} already initialized with sync point {}",
                    self.reaction_name, record.sequence
                );
                return Ok(BootstrapOutcome::AlreadyInitialized {
                    sync_point: record.sequence,
                });
            }
            warn!(
                "[{}] Sync point for query {query_id} was last updated {} and is past retention, bootstrapping again",
                self.reaction_name, record.last_updated
            );
            // Documents removed while the sync point aged would otherwise survive
            collection = self.store.recreate_collection(config).await?;
            self.sync_points
                .delete_sync_point(&self.reaction_name, query_id)
                .await?;
        }

        info!(
            "[{}] No sync point found for query {query_id}. Starting bootstrap...",
            self.reaction_name
        );

        if !self
            .management
            .wait_for_query_ready(query_id, self.wait_for_ready_seconds)
            .await?
        {
            anyhow::bail!(
                "Query {query_id} did not become ready within {} seconds",
                self.wait_for_ready_seconds
            );
        }

        let items = self
            .result_view
            .get_current_result(query_id)
            .await
            .with_context(|| format!("Failed to fetch current result of query {query_id}"))?;

        let mut items = items.into_iter();
        let sequence = match items.next() {
            Some(ViewItem {
                header: Some(header),
                ..
            }) => header.sequence,
            Some(_) => anyhow::bail!(
                "Header in result stream is missing for query {query_id}. Aborting initial sync."
            ),
            None => anyhow::bail!(
                "No header returned in result stream for query {query_id}. Aborting initial sync."
            ),
        };
        debug!(
            "[{}] Result stream header for query {query_id} has sequence {sequence}",
            self.reaction_name
        );

        let snapshot: Vec<Value> = items.filter_map(|item| item.data).collect();
        let reserved = self.sync_points.sync_point_key(query_id);
        let rows = without_reserved_rows(
            &self.reaction_name,
            snapshot.iter().collect(),
            config,
            &reserved,
        );

        let mut loaded = 0;
        if rows.is_empty() {
            info!(
                "[{}] No initial data to load for query {query_id}",
                self.reaction_name
            );
        } else {
            info!(
                "[{}] Loading {} initial items for query {query_id}",
                self.reaction_name,
                rows.len()
            );
            let documents = self.processor.process_documents(&rows, config).await?;
            self.store
                .upsert(collection.as_ref(), &documents)
                .await
                .with_context(|| {
                    format!("Failed to load initial documents for query {query_id}")
                })?;
            loaded = documents.len();
        }

        self.sync_points
            .initialize_sync_point(&self.reaction_name, query_id, sequence)
            .await?;

        info!(
            "[{}] Bootstrap completed for query {query_id} with sync point {sequence} ({loaded} documents)",
            self.reaction_name
        );
        Ok(BootstrapOutcome::Bootstrapped {
            sync_point: sequence,
            documents: loaded,
        })
    }

    async fn test_store_connectivity(&self) -> Result<()> {
        let metadata_name = crate::sync_point::metadata_collection_name(&self.reaction_name);
        self.store
            .collection_exists(&metadata_name)
            .await
            .with_context(|| {
                format!(
                    "Unable to connect to {} vector store",
                    self.store.adapter().store_type()
                )
            })?;
        info!(
            "[{}] Vector store connectivity test successful",
            self.reaction_name
        );
        Ok(())
    }

    async fn test_embedding_service(&self) -> Result<()> {
        let embedder = self.processor.embedder();
        let embeddings = embedder
            .generate(&["test".to_string()])
            .await
            .context("Unable to connect to embedding service")?;
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            anyhow::bail!("Embedding service '{}' returned empty result", embedder.name());
        }
        info!(
            "[{}] Embedding service test successful (dimensions: {dimensions})",
            self.reaction_name
        );
        Ok(())
    }
}

/// A query with a retention window owns its collection outright, since
/// expiry recreates the collection.
fn check_retention_collections(queries: &BTreeMap<String, QueryConfig>) -> Result<()> {
    for (query_id, config) in queries {
        if config.sync_point_retention_days.is_none() {
            continue;
        }
        if let Some((other, _)) = queries
            .iter()
            .find(|(id, c)| *id != query_id && c.collection_name == config.collection_name)
        {
            anyhow::bail!(
                "Query {query_id} sets syncPointRetentionDays but shares collection '{}' with query {other}",
                config.collection_name
            );
        }
    }
    Ok(())
}
