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

//! Turning result rows into vector documents.
//!
//! [`DocumentProcessor`] renders each row through the query's Handlebars
//! templates, extracts its key and attaches an embedding. A row that cannot
//! be keyed or rendered is dropped with a warning. Embedding failures are
//! returned to the caller because they affect the whole batch.

use crate::config::QueryConfig;
use crate::embedder::Embedder;
use crate::error::DocumentError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Value written to [`VectorDocument::source`].
pub const DOCUMENT_SOURCE: &str = "drasi";

pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 50;

/// A document prepared for vector storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Unique key extracted from the row's key field
    pub key: String,

    /// Rendered document template; the text that gets embedded
    pub content: String,

    pub title: Option<String>,

    pub vector: Vec<f32>,

    /// The original result row
    pub metadata: Value,

    pub timestamp: DateTime<Utc>,

    pub source: String,
}

impl VectorDocument {
    pub fn new(key: impl Into<String>, content: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            title: None,
            vector,
            metadata: Value::Null,
            timestamp: Utc::now(),
            source: DOCUMENT_SOURCE.to_string(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Converts result rows to [`VectorDocument`]s.
pub struct DocumentProcessor {
    embedder: Arc<dyn Embedder>,
    embedding_batch_size: usize,
    /// Compiled templates, registered under their own source text
    templates: RwLock<Handlebars<'static>>,
}

impl DocumentProcessor {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let mut handlebars = Handlebars::new();
        // Content is plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self {
            embedder,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            templates: RwLock::new(handlebars),
        }
    }

    pub fn with_embedding_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Build documents for `rows`. Each row yields at most one document.
    ///
    /// # Errors
    ///
    /// Only embedding generation failures are returned. Rows that fail key
    /// extraction or rendering are skipped.
    pub async fn process_documents(
        &self,
        rows: &[&Value],
        config: &QueryConfig,
    ) -> Result<Vec<VectorDocument>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Processing {} rows for collection '{}'",
            rows.len(),
            config.collection_name
        );

        let mut documents = Vec::with_capacity(rows.len());
        let mut needs_embedding = Vec::new();

        for row in rows {
            match self.build_document(row, config).await {
                Ok((document, has_vector)) => {
                    if !has_vector {
                        needs_embedding.push(documents.len());
                    }
                    documents.push(document);
                }
                Err(e) => {
                    warn!(
                        "Failed to process row for collection '{}': {e}. Row: {row}",
                        config.collection_name
                    );
                }
            }
        }

        if documents.is_empty() {
            warn!(
                "No valid documents to process for collection '{}'",
                config.collection_name
            );
            return Ok(documents);
        }

        for chunk in needs_embedding.chunks(self.embedding_batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|&i| documents[i].content.clone())
                .collect();

            let embeddings = self
                .embedder
                .generate(&texts)
                .await
                .with_context(|| {
                    format!(
                        "Failed to generate embeddings with '{}' for {} documents",
                        self.embedder.name(),
                        texts.len()
                    )
                })?;

            if embeddings.len() != texts.len() {
                anyhow::bail!(
                    "Embedding count mismatch: expected {}, got {}",
                    texts.len(),
                    embeddings.len()
                );
            }

            for (&i, vector) in chunk.iter().zip(embeddings) {
                documents[i].vector = vector;
            }
        }

        debug!(
            "Processed {} documents ({} embedded) for collection '{}'",
            documents.len(),
            needs_embedding.len(),
            config.collection_name
        );

        Ok(documents)
    }

    /// Extract the key of `row` as configured by `config.key_field`.
    ///
    /// A top-level field whose name contains dots wins over the nested path.
    pub fn extract_key(&self, row: &Value, config: &QueryConfig) -> Result<String, DocumentError> {
        extract_key(row, &config.key_field)
    }

    async fn build_document(
        &self,
        row: &Value,
        config: &QueryConfig,
    ) -> Result<(VectorDocument, bool), DocumentError> {
        let key = extract_key(row, &config.key_field)?;
        let content = self.render(&config.document_template, row).await?;

        let title = match &config.title_template {
            Some(template) if !template.is_empty() => match self.render(template, row).await {
                Ok(title) => Some(title),
                Err(e) => {
                    warn!("Failed to render title for key '{key}': {e}");
                    None
                }
            },
            _ => None,
        };

        let precomputed = config
            .vector_field
            .as_deref()
            .and_then(|field| read_vector(row, field));
        if config.vector_field.is_some() && precomputed.is_none() {
            debug!("Row '{key}' has no usable precomputed vector, embedding content instead");
        }
        let has_vector = precomputed.is_some();

        let document = VectorDocument {
            key,
            content,
            title,
            vector: precomputed.unwrap_or_default(),
            metadata: row.clone(),
            timestamp: Utc::now(),
            source: DOCUMENT_SOURCE.to_string(),
        };
        Ok((document, has_vector))
    }

    async fn render(&self, template: &str, row: &Value) -> Result<String, DocumentError> {
        {
            let templates = self.templates.read().await;
            if templates.has_template(template) {
                return templates
                    .render(template, row)
                    .map_err(|e| DocumentError::Template(e.to_string()));
            }
        }

        let mut templates = self.templates.write().await;
        if !templates.has_template(template) {
            templates
                .register_template_string(template, template)
                .map_err(|e| DocumentError::Template(e.to_string()))?;
        }
        templates
            .render(template, row)
            .map_err(|e| DocumentError::Template(e.to_string()))
    }
}

/// Extract a key from `row` by field name or dot-separated path.
pub fn extract_key(row: &Value, key_field: &str) -> Result<String, DocumentError> {
    if key_field.is_empty() {
        return Err(DocumentError::KeyFieldNotConfigured);
    }

    let value = match row.get(key_field) {
        Some(value) => value,
        None => {
            let mut current = row;
            for part in key_field.split('.') {
                current = current
                    .get(part)
                    .ok_or_else(|| DocumentError::MissingKeyField(key_field.to_string()))?;
            }
            current
        }
    };

    match value {
        Value::Null => Err(DocumentError::NullKeyField(key_field.to_string())),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Ok(other.to_string()),
    }
}

fn read_vector(row: &Value, field: &str) -> Option<Vec<f32>> {
    let values = row.get(field)?.as_array()?;
    if values.is_empty() {
        return None;
    }
    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
