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

//! Qdrant backend for the sync vector store reaction.
//!
//! Documents become Qdrant points. The point id is a UUID v5 derived from the
//! document key, so re-upserting a key replaces the same point and a delete
//! only needs the key. The full document minus its vector is kept in the
//! point payload.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drasi_sync_vectorstore_core::{
    DistanceFunction, IndexKind, VectorCollection, VectorDocument, VectorStoreAdapter,
    VectorStoreSettings,
};
use log::{debug, info, warn};
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeleteCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, GetPointsBuilder, ListValue, PointId, PointStruct,
    PointsIdsList, Struct, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Namespace for point ids derived from document keys.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x3c1f_9a0e_5d7b_4e26_b8a4_61f2_d09c_7e35);

const KEY_FIELD: &str = "key";
const CONTENT_FIELD: &str = "content";
const TITLE_FIELD: &str = "title";
const METADATA_FIELD: &str = "metadata";
const TIMESTAMP_FIELD: &str = "timestamp";
const SOURCE_FIELD: &str = "source";

/// Deterministic point id for a document key.
pub fn point_id(key: &str) -> Uuid {
    Uuid::new_v5(&POINT_ID_NAMESPACE, key.as_bytes())
}

/// Map a configured distance function to the Qdrant metric.
///
/// Qdrant reports cosine as a similarity, so both cosine variants map to
/// [`Distance::Cosine`].
pub fn qdrant_distance(distance: DistanceFunction) -> Distance {
    match distance {
        DistanceFunction::CosineSimilarity | DistanceFunction::CosineDistance => Distance::Cosine,
        DistanceFunction::EuclideanDistance => Distance::Euclid,
        DistanceFunction::DotProductSimilarity => Distance::Dot,
        DistanceFunction::ManhattanDistance => Distance::Manhattan,
    }
}

/// [`VectorStoreAdapter`] over a Qdrant server.
pub struct QdrantVectorStoreAdapter {
    client: Arc<Qdrant>,
    endpoint: String,
}

impl QdrantVectorStoreAdapter {
    /// Build a client for `endpoint` (the gRPC port, usually 6334).
    ///
    /// No request is made until the first collection call.
    pub fn connect(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let mut builder = Qdrant::from_url(endpoint);
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }
        let client = builder.build().context("Failed to create Qdrant client")?;

        Ok(Self {
            client: Arc::new(client),
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn create_collection(&self, name: &str, settings: &VectorStoreSettings) -> Result<()> {
        if settings.index_kind != IndexKind::Hnsw {
            warn!(
                "Qdrant only supports HNSW indexes; ignoring {:?} for collection '{name}'",
                settings.index_kind
            );
        }

        let dimensions = settings.embedding_dimensions as u64;
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(dimensions, qdrant_distance(settings.distance_function)),
            ))
            .await
            .with_context(|| format!("Failed to create Qdrant collection '{name}'"))?;

        if settings.is_filterable {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(name, KEY_FIELD, FieldType::Keyword)
                        .wait(true),
                )
                .await
                .with_context(|| format!("Failed to index '{KEY_FIELD}' in '{name}'"))?;
        }
        if settings.is_full_text_searchable {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(name, CONTENT_FIELD, FieldType::Text)
                        .wait(true),
                )
                .await
                .with_context(|| format!("Failed to index '{CONTENT_FIELD}' in '{name}'"))?;
        }

        info!("Created Qdrant collection '{name}' with {dimensions} dimensions");
        Ok(())
    }
}

#[async_trait]
impl VectorStoreAdapter for QdrantVectorStoreAdapter {
    fn store_type(&self) -> &str {
        "qdrant"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        settings: &VectorStoreSettings,
        create: bool,
    ) -> Result<Arc<dyn VectorCollection>> {
        if !self.collection_exists(name).await? {
            if !create {
                anyhow::bail!("Collection '{name}' does not exist and createCollection is false");
            }
            self.create_collection(name, settings).await?;
        }

        Ok(Arc::new(QdrantCollection {
            client: self.client.clone(),
            name: name.to_string(),
        }))
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .with_context(|| format!("Failed to check existence of Qdrant collection '{name}'"))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        self.client
            .delete_collection(DeleteCollectionBuilder::new(name))
            .await
            .with_context(|| format!("Failed to delete Qdrant collection '{name}'"))?;
        info!("Deleted Qdrant collection '{name}'");
        Ok(())
    }
}

/// Handle to one Qdrant collection.
pub struct QdrantCollection {
    client: Arc<Qdrant>,
    name: String,
}

#[async_trait]
impl VectorCollection for QdrantCollection {
    fn name(&self) -> &str {
        &self.name
    }

    /// Fetch a document by key. The vector is not retrieved.
    async fn get(&self, key: &str) -> Result<Option<VectorDocument>> {
        let id: PointId = point_id(key).to_string().into();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.name, vec![id])
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .with_context(|| format!("Failed to get point '{key}' from '{}'", self.name))?;

        match response.result.into_iter().next() {
            Some(point) => document_from_payload(point.payload).map(Some),
            None => Ok(None),
        }
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = documents
            .iter()
            .map(|doc| {
                PointStruct::new(
                    point_id(&doc.key).to_string(),
                    doc.vector.clone(),
                    payload_from_document(doc),
                )
            })
            .collect();

        // wait(true) so the points are applied before the sync point moves
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.name, points).wait(true))
            .await
            .with_context(|| format!("Failed to upsert points to '{}'", self.name))?;

        debug!("Upserted {} points to '{}'", documents.len(), self.name);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let ids: Vec<PointId> = keys
            .iter()
            .map(|key| point_id(key).to_string().into())
            .collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.name)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .with_context(|| format!("Failed to delete points from '{}'", self.name))?;

        debug!("Deleted {} points from '{}'", keys.len(), self.name);
        Ok(())
    }
}

fn payload_from_document(doc: &VectorDocument) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert(KEY_FIELD.to_string(), string_value(&doc.key));
    payload.insert(CONTENT_FIELD.to_string(), string_value(&doc.content));
    if let Some(title) = &doc.title {
        payload.insert(TITLE_FIELD.to_string(), string_value(title));
    }
    payload.insert(METADATA_FIELD.to_string(), json_to_qdrant_value(&doc.metadata));
    payload.insert(
        TIMESTAMP_FIELD.to_string(),
        string_value(&doc.timestamp.to_rfc3339()),
    );
    payload.insert(SOURCE_FIELD.to_string(), string_value(&doc.source));
    payload
}

fn document_from_payload(mut payload: HashMap<String, QdrantValue>) -> Result<VectorDocument> {
    let mut take_string = |field: &str| match payload.remove(field).and_then(|v| v.kind) {
        Some(Kind::StringValue(s)) => Some(s),
        _ => None,
    };

    let key = take_string(KEY_FIELD).context("Qdrant point payload has no key")?;
    let content = take_string(CONTENT_FIELD).unwrap_or_default();
    let title = take_string(TITLE_FIELD);
    let source = take_string(SOURCE_FIELD);
    let timestamp = take_string(TIMESTAMP_FIELD)
        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|ts| ts.with_timezone(&Utc));
    let metadata = payload
        .remove(METADATA_FIELD)
        .map(qdrant_value_to_json)
        .unwrap_or(Value::Null);

    let mut doc = VectorDocument::new(key, content, Vec::new()).with_metadata(metadata);
    doc.title = title;
    if let Some(source) = source {
        doc.source = source;
    }
    if let Some(timestamp) = timestamp {
        doc.timestamp = timestamp;
    }
    Ok(doc)
}

fn string_value(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn json_to_qdrant_value(value: &Value) -> QdrantValue {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Kind::IntegerValue(i),
            (None, Some(f)) => Kind::DoubleValue(f),
            (None, None) => Kind::StringValue(n.to_string()),
        },
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(json_to_qdrant_value).collect(),
        }),
        Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(f)) => Value::from(f),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}
