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

//! HTTP clients used to bootstrap queries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use drasi_sync_vectorstore_core::{ManagementClient, ResultViewClient, ViewItem};
use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;

/// Extra time allowed on top of the server-side wait before the request
/// itself times out.
const READY_WAIT_GRACE: Duration = Duration::from_secs(10);

/// Reads a query's current result set from the query container's view
/// service.
pub struct HttpResultViewClient {
    client: Client,
    base_url: String,
}

impl HttpResultViewClient {
    /// Client for the view service of `query_container_id`.
    pub fn new(query_container_id: &str) -> Self {
        Self::with_base_url(format!("http://{query_container_id}-view-svc"))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, query_id: &str) -> String {
        format!("{}/{query_id}", self.base_url)
    }
}

#[async_trait]
impl ResultViewClient for HttpResultViewClient {
    async fn get_current_result(&self, query_id: &str) -> Result<Vec<ViewItem>> {
        let url = self.url(query_id);
        debug!("Fetching current result of query {query_id} from {url}");

        let items: Vec<ViewItem> = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch current result from {url}"))?
            .error_for_status()
            .with_context(|| format!("Result view service returned an error for {query_id}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse current result of query {query_id}"))?;

        debug!("Query {query_id} returned {} view items", items.len());
        Ok(items)
    }
}

/// Readiness checks against the Drasi management API.
pub struct HttpManagementClient {
    client: Client,
    base_url: String,
}

impl HttpManagementClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn ready_wait_url(&self, query_id: &str, timeout_seconds: u64) -> String {
        format!(
            "{}/v1/continuousQueries/{query_id}/ready-wait?timeout={timeout_seconds}",
            self.base_url
        )
    }
}

#[async_trait]
impl ManagementClient for HttpManagementClient {
    async fn wait_for_query_ready(&self, query_id: &str, timeout_seconds: u64) -> Result<bool> {
        let url = self.ready_wait_url(query_id, timeout_seconds);
        info!("Waiting up to {timeout_seconds}s for query {query_id} to become ready");

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(timeout_seconds) + READY_WAIT_GRACE)
            .send()
            .await
            .with_context(|| format!("Failed to wait for query {query_id} readiness"))?;

        let status = response.status();
        if status.is_success() {
            info!("Query {query_id} is ready");
            Ok(true)
        } else {
            warn!("Query {query_id} is not ready: management API returned {status}");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_view_url() {
        let client = HttpResultViewClient::new("default");
        assert_eq!(client.url("products"), "http://default-view-svc/products");

        let client = HttpResultViewClient::with_base_url("http://localhost:8080/");
        assert_eq!(client.url("q1"), "http://localhost:8080/q1");
    }

    #[test]
    fn test_ready_wait_url() {
        let client = HttpManagementClient::new("http://drasi-api:8080/");
        assert_eq!(
            client.ready_wait_url("products", 300),
            "http://drasi-api:8080/v1/continuousQueries/products/ready-wait?timeout=300"
        );
    }

    #[tokio::test]
    async fn test_unreachable_view_service_is_an_error() {
        let client = HttpResultViewClient::with_base_url("http://127.0.0.1:1");
        assert!(client.get_current_result("q1").await.is_err());
    }
}
