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

//! Azure AI Search backend over the REST API.
//!
//! Each collection maps to a search index. Writes go through the
//! `docs/index` batch endpoint, which may partially succeed; any failed item
//! fails the whole call so the change event is redelivered.

use crate::config::AzureAiSearchStoreConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drasi_sync_vectorstore_core::{
    DistanceFunction, IndexKind, VectorCollection, VectorDocument, VectorStoreAdapter,
    VectorStoreSettings,
};
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const ALGORITHM_NAME: &str = "drasi-vector-algorithm";
const PROFILE_NAME: &str = "drasi-vector-profile";

/// Azure AI Search index names allow lowercase letters, digits and dashes,
/// and must start with a letter or digit.
pub fn index_name(collection_name: &str) -> String {
    let mapped: String = collection_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}

/// Build the index definition for a collection.
pub fn index_definition(name: &str, settings: &VectorStoreSettings) -> Result<Value> {
    let metric = match settings.distance_function {
        DistanceFunction::CosineSimilarity | DistanceFunction::CosineDistance => "cosine",
        DistanceFunction::EuclideanDistance => "euclidean",
        DistanceFunction::DotProductSimilarity => "dotProduct",
        DistanceFunction::ManhattanDistance => {
            anyhow::bail!("Azure AI Search does not support the ManhattanDistance function")
        }
    };

    let algorithm = match settings.index_kind {
        IndexKind::Hnsw => json!({
            "name": ALGORITHM_NAME,
            "kind": "hnsw",
            "hnswParameters": {"metric": metric}
        }),
        IndexKind::Flat => json!({
            "name": ALGORITHM_NAME,
            "kind": "exhaustiveKnn",
            "exhaustiveKnnParameters": {"metric": metric}
        }),
        other => anyhow::bail!("Azure AI Search does not support the {other:?} index kind"),
    };

    let filterable = settings.is_filterable;
    Ok(json!({
        "name": name,
        "fields": [
            {"name": "key", "type": "Edm.String", "key": true, "filterable": true},
            {
                "name": "content",
                "type": "Edm.String",
                "searchable": settings.is_full_text_searchable
            },
            {"name": "title", "type": "Edm.String", "filterable": filterable},
            {"name": "metadata", "type": "Edm.String"},
            {"name": "timestamp", "type": "Edm.DateTimeOffset", "filterable": filterable},
            {"name": "source", "type": "Edm.String", "filterable": filterable},
            {
                "name": "vector",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": settings.embedding_dimensions,
                "vectorSearchProfile": PROFILE_NAME
            }
        ],
        "vectorSearch": {
            "algorithms": [algorithm],
            "profiles": [{"name": PROFILE_NAME, "algorithm": ALGORITHM_NAME}]
        }
    }))
}

/// Index action for one document. The row metadata is stored as a JSON
/// string since index fields have a fixed schema.
fn upload_action(doc: &VectorDocument) -> Value {
    json!({
        "@search.action": "mergeOrUpload",
        "key": doc.key,
        "content": doc.content,
        "title": doc.title,
        "metadata": doc.metadata.to_string(),
        "timestamp": doc.timestamp.to_rfc3339(),
        "source": doc.source,
        "vector": doc.vector,
    })
}

fn delete_action(key: &str) -> Value {
    json!({"@search.action": "delete", "key": key})
}

#[derive(Debug, Deserialize)]
struct IndexBatchResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    status_code: u16,
}

/// Fail if any item of a batch response was not applied.
fn check_batch_response(index: &str, response: &IndexBatchResponse) -> Result<()> {
    let failed: Vec<String> = response
        .value
        .iter()
        .filter(|r| !r.status)
        .map(|r| {
            format!(
                "{} ({}: {})",
                r.key,
                r.status_code,
                r.error_message.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} documents failed in index '{index}': {}",
            failed.len(),
            response.value.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

fn document_from_search(value: Value) -> Result<VectorDocument> {
    #[derive(Deserialize)]
    struct Stored {
        key: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        metadata: Option<String>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        vector: Option<Vec<f32>>,
    }

    let stored: Stored =
        serde_json::from_value(value).context("Failed to parse Azure AI Search document")?;
    let metadata = match stored.metadata {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => Value::Null,
    };

    let mut doc = VectorDocument::new(
        stored.key,
        stored.content.unwrap_or_default(),
        stored.vector.unwrap_or_default(),
    )
    .with_metadata(metadata);
    doc.title = stored.title;
    if let Some(timestamp) = stored.timestamp {
        doc.timestamp = timestamp;
    }
    if let Some(source) = stored.source {
        doc.source = source;
    }
    Ok(doc)
}

struct SearchClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    api_version: String,
}

impl SearchClient {
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Azure AI Search endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(segments)?)
            .header("api-key", &self.api_key))
    }

    async fn index_batch(&self, index: &str, actions: Vec<Value>) -> Result<()> {
        let count = actions.len();
        let response = self
            .request(Method::POST, &["indexes", index, "docs", "index"])?
            .json(&json!({"value": actions}))
            .send()
            .await
            .with_context(|| format!("Failed to send batch to index '{index}'"))?;

        let status = response.status();
        // 207 carries per-item results for a partially applied batch
        if !status.is_success() && status != StatusCode::MULTI_STATUS {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure AI Search batch on '{index}' failed with {status}: {body}");
        }

        let body: IndexBatchResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse batch response from index '{index}'"))?;
        check_batch_response(index, &body)?;

        debug!("Applied {count} index actions to '{index}'");
        Ok(())
    }
}

/// [`VectorStoreAdapter`] over an Azure AI Search service.
pub struct AzureAiSearchVectorStoreAdapter {
    client: Arc<SearchClient>,
}

impl AzureAiSearchVectorStoreAdapter {
    pub fn new(config: &AzureAiSearchStoreConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid Azure AI Search endpoint '{}'", config.endpoint))?;

        Ok(Self {
            client: Arc::new(SearchClient {
                http: Client::new(),
                endpoint,
                api_key: config.api_key.clone(),
                api_version: config.api_version.clone(),
            }),
        })
    }
}

#[async_trait]
impl VectorStoreAdapter for AzureAiSearchVectorStoreAdapter {
    fn store_type(&self) -> &str {
        "azureAiSearch"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        settings: &VectorStoreSettings,
        create: bool,
    ) -> Result<Arc<dyn VectorCollection>> {
        let index = index_name(name);

        if !self.collection_exists(name).await? {
            if !create {
                anyhow::bail!("Index '{index}' does not exist and createCollection is false");
            }

            let definition = index_definition(&index, settings)?;
            let response = self
                .client
                .request(Method::PUT, &["indexes", &index])?
                .json(&definition)
                .send()
                .await
                .with_context(|| format!("Failed to create index '{index}'"))?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Failed to create index '{index}': {status}: {body}");
            }
            info!(
                "Created Azure AI Search index '{index}' with {} dimensions",
                settings.embedding_dimensions
            );
        }

        Ok(Arc::new(AzureAiSearchCollection {
            client: self.client.clone(),
            name: name.to_string(),
            index,
        }))
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let index = index_name(name);
        let response = self
            .client
            .request(Method::GET, &["indexes", &index])?
            .send()
            .await
            .with_context(|| format!("Failed to look up index '{index}'"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => anyhow::bail!("Failed to look up index '{index}': {status}"),
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let index = index_name(name);
        let response = self
            .client
            .request(Method::DELETE, &["indexes", &index])?
            .send()
            .await
            .with_context(|| format!("Failed to delete index '{index}'"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => {
                info!("Deleted Azure AI Search index '{index}'");
                Ok(())
            }
            status => anyhow::bail!("Failed to delete index '{index}': {status}"),
        }
    }
}

pub struct AzureAiSearchCollection {
    client: Arc<SearchClient>,
    name: String,
    index: String,
}

#[async_trait]
impl VectorCollection for AzureAiSearchCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<VectorDocument>> {
        let response = self
            .client
            .request(Method::GET, &["indexes", &self.index, "docs", key])?
            .send()
            .await
            .with_context(|| format!("Failed to get '{key}' from index '{}'", self.index))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: Value = response.json().await.with_context(|| {
                    format!("Failed to parse '{key}' from index '{}'", self.index)
                })?;
                document_from_search(value).map(Some)
            }
            status => anyhow::bail!("Failed to get '{key}' from index '{}': {status}", self.index),
        }
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let actions = documents.iter().map(upload_action).collect();
        self.client.index_batch(&self.index, actions).await
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let actions = keys.iter().map(|k| delete_action(k)).collect();
        self.client.index_batch(&self.index, actions).await
    }
}
