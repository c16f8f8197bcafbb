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

//! Error taxonomy for the sync pipeline.
//!
//! Only [`SyncError`] ever escapes [`ChangeEventHandler::handle_change`](crate::ChangeEventHandler::handle_change).
//! Row-level problems are reported as [`DocumentError`] and are always
//! recovered by dropping the offending row.

use thiserror::Error;

/// Errors escalated out of the change event handler.
///
/// Returning any of these tells the hosting transport to redeliver the event.
/// [`SyncError::is_retryable`] distinguishes faults that redelivery alone can
/// heal from those that need operator action.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Received change event for query {query_id} which was not yet initialized. Sync point not found."
    )]
    NotInitialized { query_id: String },

    #[error("Store operation '{operation}' failed for query {query_id}: {source:#}")]
    Store {
        operation: &'static str,
        query_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "Failed to update sync point after processing change event {sequence} for query {query_id}. This may cause duplicate processing."
    )]
    SyncPointCommit { query_id: String, sequence: u64 },

    #[error("Processing cancelled during {phase}")]
    Cancelled { phase: &'static str },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    pub fn store(operation: &'static str, query_id: &str, source: anyhow::Error) -> Self {
        SyncError::Store {
            operation,
            query_id: query_id.to_string(),
            source,
        }
    }

    /// Whether redelivering the same event can succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Configuration(_))
    }
}

/// Per-row failures while turning result rows into store documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Key field is not configured for this query")]
    KeyFieldNotConfigured,

    #[error("Key field '{0}' not found in result row")]
    MissingKeyField(String),

    #[error("Key field '{0}' is null in result row")]
    NullKeyField(String),

    #[error("Template rendering failed: {0}")]
    Template(String),
}
