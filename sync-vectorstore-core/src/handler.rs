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

//! The sequence-gated change event handler.
//!
//! For every delivered [`ChangeEvent`] the handler walks through
//! [`Phase::AwaitingSyncPoint`], [`Phase::Gated`], [`Phase::Writing`] and
//! [`Phase::CommittingSyncPoint`]. The sync point only moves after every
//! write of the event succeeded. Any failure returns a [`SyncError`] and
//! leaves the sync point untouched, so the transport redelivers the event and
//! the idempotent writes are simply repeated.

use crate::config::QueryConfig;
use crate::document::{extract_key, DocumentProcessor};
use crate::error::SyncError;
use crate::event::ChangeEvent;
use crate::store::{VectorCollection, VectorStoreService};
use crate::sync_point::SyncPointManager;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Processing stage of a single change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSyncPoint,
    Gated,
    Writing,
    CommittingSyncPoint,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::AwaitingSyncPoint => "awaiting sync point",
            Phase::Gated => "gated",
            Phase::Writing => "writing",
            Phase::CommittingSyncPoint => "committing sync point",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing an event sequence with the stored sync point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The event was already applied.
    Skip { sync_point: u64 },
    Proceed { sync_point: u64 },
    /// No sync point exists; bootstrap has not finished.
    NotInitialized,
}

/// Decide what to do with an event.
///
/// Only strictly older events are skipped. An event whose sequence equals the
/// sync point is applied again.
pub fn gate(sequence: u64, sync_point: Option<u64>) -> GateDecision {
    match sync_point {
        None => GateDecision::NotInitialized,
        Some(sync_point) if sequence < sync_point => GateDecision::Skip { sync_point },
        Some(sync_point) => GateDecision::Proceed { sync_point },
    }
}

/// What a successful [`ChangeEventHandler::handle_change`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Skipped {
        sequence: u64,
        sync_point: u64,
    },
    Processed {
        sequence: u64,
        upserted: usize,
        deleted: usize,
    },
}

pub struct ChangeEventHandler {
    reaction_name: String,
    store: Arc<VectorStoreService>,
    processor: Arc<DocumentProcessor>,
    sync_points: Arc<dyn SyncPointManager>,
}

impl ChangeEventHandler {
    pub fn new(
        reaction_name: impl Into<String>,
        store: Arc<VectorStoreService>,
        processor: Arc<DocumentProcessor>,
        sync_points: Arc<dyn SyncPointManager>,
    ) -> Self {
        Self {
            reaction_name: reaction_name.into(),
            store,
            processor,
            sync_points,
        }
    }

    pub fn reaction_name(&self) -> &str {
        &self.reaction_name
    }

    /// Apply one change event.
    ///
    /// Returning `Ok` means the event may be acknowledged. Any `Err` means it
    /// must be redelivered. Callers must not run two invocations for the same
    /// query concurrently; the sync point commit rejects a racing writer but
    /// cannot undo its writes.
    pub async fn handle_change(
        &self,
        event: &ChangeEvent,
        config: Option<&QueryConfig>,
        cancel: &CancellationToken,
    ) -> Result<HandleOutcome, SyncError> {
        let Some(config) = config else {
            let err = SyncError::configuration(format!(
                "Query configuration is missing for query {}",
                event.query_id
            ));
            error!("[{}] {err}", self.reaction_name);
            return Err(err);
        };

        info!(
            "[{}] Processing change event for query {} with sequence {}. Added: {}, Updated: {}, Deleted: {}",
            self.reaction_name,
            event.query_id,
            event.sequence,
            event.added_results.len(),
            event.updated_results.len(),
            event.deleted_results.len()
        );

        let mut phase = Phase::AwaitingSyncPoint;
        let result = self.run(event, config, cancel, &mut phase).await;

        match &result {
            Ok(HandleOutcome::Processed { .. }) => info!(
                "[{}] Successfully processed change event {} for query {}",
                self.reaction_name, event.sequence, event.query_id
            ),
            Ok(HandleOutcome::Skipped { .. }) => {}
            Err(SyncError::NotInitialized { .. }) => warn!(
                "[{}] Change event {} for query {} arrived before bootstrap completed",
                self.reaction_name, event.sequence, event.query_id
            ),
            Err(e) => error!(
                "[{}] Failed to process change event {} for query {} during {phase}. Sync point not updated: {e}",
                self.reaction_name, event.sequence, event.query_id
            ),
        }
        result
    }

    async fn run(
        &self,
        event: &ChangeEvent,
        config: &QueryConfig,
        cancel: &CancellationToken,
        phase: &mut Phase,
    ) -> Result<HandleOutcome, SyncError> {
        let query_id = event.query_id.as_str();

        let collection = guarded(cancel, *phase, async {
            self.store
                .get_or_create_collection(config)
                .await
                .map_err(|e| SyncError::store("open collection", query_id, e))
        })
        .await?;

        let sync_point = guarded(cancel, *phase, async {
            self.sync_points
                .get_sync_point(&self.reaction_name, query_id)
                .await
                .map_err(|e| SyncError::store("read sync point", query_id, e))
        })
        .await?;

        *phase = Phase::Gated;
        match gate(event.sequence, sync_point) {
            GateDecision::NotInitialized => {
                return Err(SyncError::NotInitialized {
                    query_id: query_id.to_string(),
                });
            }
            GateDecision::Skip { sync_point } => {
                info!(
                    "[{}] Skipping duplicate event. Sequence {} < sync point {sync_point} for query {query_id}",
                    self.reaction_name, event.sequence
                );
                *phase = Phase::Done;
                return Ok(HandleOutcome::Skipped {
                    sequence: event.sequence,
                    sync_point,
                });
            }
            GateDecision::Proceed { sync_point } => {
                debug!(
                    "[{}] Sequence {} >= sync point {sync_point} for query {query_id}, processing",
                    self.reaction_name, event.sequence
                );
            }
        }

        *phase = Phase::Writing;
        let upserted = self
            .process_upserts(collection.as_ref(), event, config, cancel)
            .await?;
        let deleted = self
            .process_deletions(collection.as_ref(), event, config, cancel)
            .await?;

        *phase = Phase::CommittingSyncPoint;
        let committed = guarded(cancel, *phase, async {
            self.sync_points
                .try_update_sync_point(&self.reaction_name, query_id, event.sequence)
                .await
                .map_err(|e| SyncError::store("commit sync point", query_id, e))
        })
        .await?;
        if !committed {
            return Err(SyncError::SyncPointCommit {
                query_id: query_id.to_string(),
                sequence: event.sequence,
            });
        }

        *phase = Phase::Done;
        Ok(HandleOutcome::Processed {
            sequence: event.sequence,
            upserted,
            deleted,
        })
    }

    async fn process_upserts(
        &self,
        collection: &dyn VectorCollection,
        event: &ChangeEvent,
        config: &QueryConfig,
        cancel: &CancellationToken,
    ) -> Result<usize, SyncError> {
        let query_id = event.query_id.as_str();
        let reserved = self.sync_points.sync_point_key(query_id);
        let rows =
            without_reserved_rows(&self.reaction_name, event.upsert_rows(), config, &reserved);
        if rows.is_empty() {
            debug!(
                "[{}] No documents to upsert for query {query_id}",
                self.reaction_name
            );
            return Ok(0);
        }

        let documents = guarded(cancel, Phase::Writing, async {
            self.processor
                .process_documents(&rows, config)
                .await
                .map_err(|e| SyncError::store("generate documents", query_id, e))
        })
        .await?;

        if documents.is_empty() {
            warn!(
                "[{}] No valid vector documents generated from {} query results for query {query_id}",
                self.reaction_name,
                rows.len()
            );
            return Ok(0);
        }

        guarded(cancel, Phase::Writing, async {
            self.store
                .upsert(collection, &documents)
                .await
                .map_err(|e| SyncError::store("upsert", query_id, e))
        })
        .await?;

        info!(
            "[{}] Upserted {} documents for query {query_id}",
            self.reaction_name,
            documents.len()
        );
        Ok(documents.len())
    }

    async fn process_deletions(
        &self,
        collection: &dyn VectorCollection,
        event: &ChangeEvent,
        config: &QueryConfig,
        cancel: &CancellationToken,
    ) -> Result<usize, SyncError> {
        let query_id = event.query_id.as_str();
        if event.deleted_results.is_empty() {
            debug!(
                "[{}] No documents to delete for query {query_id}",
                self.reaction_name
            );
            return Ok(0);
        }

        let keys: Vec<String> = event
            .deleted_results
            .iter()
            .filter_map(|row| match self.processor.extract_key(row, config) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(
                        "[{}] Failed to extract key from deleted result for query {query_id}: {e}",
                        self.reaction_name
                    );
                    None
                }
            })
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }

        guarded(cancel, Phase::Writing, async {
            self.store
                .delete(collection, &keys)
                .await
                .map_err(|e| SyncError::store("delete", query_id, e))
        })
        .await?;

        info!(
            "[{}] Deleted {} documents for query {query_id}",
            self.reaction_name,
            keys.len()
        );
        Ok(keys.len())
    }
}

/// Drop rows keyed with the bookkeeping key `reserved`.
pub(crate) fn without_reserved_rows<'a>(
    reaction_name: &str,
    rows: Vec<&'a Value>,
    config: &QueryConfig,
    reserved: &str,
) -> Vec<&'a Value> {
    rows.into_iter()
        .filter(|row| match extract_key(row, &config.key_field) {
            Ok(key) if key == reserved => {
                warn!("[{reaction_name}] Ignoring result row with reserved key '{reserved}'");
                false
            }
            _ => true,
        })
        .collect()
}

/// Run `fut` unless `cancel` fires first.
async fn guarded<T, F>(cancel: &CancellationToken, phase: Phase, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled { phase: phase.as_str() }),
        result = fut => result,
    }
}
