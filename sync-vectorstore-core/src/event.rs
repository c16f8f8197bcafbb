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

//! Change events delivered by the continuous query engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One delivery unit for a continuous query.
///
/// `sequence` increases strictly per query in emission order, but the same
/// sequence may arrive more than once under at-least-once delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub query_id: String,
    pub sequence: u64,
    #[serde(default)]
    pub source_time_ms: u64,
    #[serde(default)]
    pub added_results: Vec<Value>,
    #[serde(default)]
    pub updated_results: Vec<UpdatedResult>,
    #[serde(default)]
    pub deleted_results: Vec<Value>,
}

/// An updated row with its pre- and post-change projections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatedResult {
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
}

impl ChangeEvent {
    pub fn new(query_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            query_id: query_id.into(),
            sequence,
            ..Default::default()
        }
    }

    pub fn with_added(mut self, row: Value) -> Self {
        self.added_results.push(row);
        self
    }

    pub fn with_updated(mut self, before: Value, after: Value) -> Self {
        self.updated_results.push(UpdatedResult { before, after });
        self
    }

    pub fn with_deleted(mut self, row: Value) -> Self {
        self.deleted_results.push(row);
        self
    }

    /// Rows to upsert: every added row followed by the `after` side of every update.
    pub fn upsert_rows(&self) -> Vec<&Value> {
        self.added_results
            .iter()
            .chain(self.updated_results.iter().map(|u| &u.after))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added_results.is_empty()
            && self.updated_results.is_empty()
            && self.deleted_results.is_empty()
    }
}
