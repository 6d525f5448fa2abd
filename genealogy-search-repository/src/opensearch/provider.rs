//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    BulkOperation, BulkParts, DeleteByQueryParts, GetParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::dsl::{Query, SearchDefinition};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::types::{BatchOperationResult, BatchOperationSummary, BulkIndexItem, RawSearchResponse};
use crate::utils::redact_url;

/// OpenSearch provider implementation.
///
/// All operations target the configured alias.
///
/// # Example
///
/// ```ignore
/// use genealogy_search_repository::opensearch::{IndexConfig, OpenSearchProvider};
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::new("records", 0)).await?;
/// provider.ensure_index_exists().await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing alias and version
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %redact_url(url),
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Turn a non-success response into an error carrying status and body.
    async fn check_status(
        response: Response,
        operation: &str,
        make_err: fn(String) -> SearchIndexError,
    ) -> Result<Response, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation, "Request failed");
        Err(make_err(format!(
            "{} failed with status {}: {}",
            operation, status, error_body
        )))
    }

    /// Extract per-item outcomes from a bulk response body.
    fn parse_bulk_items(items: &[BulkIndexItem], body: &Value) -> BatchOperationSummary {
        let response_items = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let results = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let outcome = response_items.get(i).and_then(|r| r.get("index"));
                let status = outcome
                    .and_then(|o| o.get("status"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let error = outcome.and_then(|o| o.get("error")).map(|e| {
                    e.get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                });
                let success = outcome.is_some() && error.is_none() && (200..300).contains(&status);
                BatchOperationResult {
                    doc_id: item.doc_id.clone(),
                    success,
                    error: if success {
                        None
                    } else {
                        Some(error.unwrap_or_else(|| format!("status {}", status)))
                    },
                }
            })
            .collect();

        BatchOperationSummary::from_results(results)
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let alias = self.index_config.alias.as_str();
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(alias, "Index already exists");
            return Ok(());
        }

        let index_name = self.index_config.versioned_index_name();
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(get_index_settings(alias))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;
        Self::check_status(response, "Index creation", SearchIndexError::IndexCreationError)
            .await?;

        info!(index = %index_name, alias, "Created search index");
        Ok(())
    }

    /// Index many documents in one bulk request.
    ///
    /// Waits for a refresh so the documents are searchable when this returns.
    async fn bulk_index(
        &self,
        items: &[BulkIndexItem],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if items.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let operations: Vec<BulkOperation<Value>> = items
            .iter()
            .map(|item| BulkOperation::index(item.body.clone()).id(&item.doc_id).into())
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.alias))
            .refresh(Refresh::WaitFor)
            .body(operations)
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_index(e.to_string()))?;
        let response =
            Self::check_status(response, "Bulk index", SearchIndexError::BulkIndexError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_items(items, &body);
        debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    async fn search(
        &self,
        definition: &SearchDefinition,
    ) -> Result<RawSearchResponse, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index_config.alias.as_str()]))
            .body(definition.to_json())
            .send()
            .await
            .map_err(|e| SearchIndexError::search(e.to_string()))?;
        let response =
            Self::check_status(response, "Search", SearchIndexError::SearchError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        RawSearchResponse::from_json(&body)
    }

    async fn get(&self, doc_id: &str) -> Result<Option<Value>, SearchIndexError> {
        let response = self
            .client
            .get(GetParts::IndexId(&self.index_config.alias, doc_id))
            .send()
            .await
            .map_err(|e| SearchIndexError::get(e.to_string()))?;

        // 404 is expected for unknown IDs
        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check_status(response, "Get", SearchIndexError::GetError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get("_source").cloned())
    }

    async fn delete_by_query(&self, query: &Query) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[self.index_config.alias.as_str()]))
            .refresh(true)
            .body(json!({ "query": query.to_json() }))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;
        let response =
            Self::check_status(response, "Delete by query", SearchIndexError::DeleteError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        debug!(deleted, "Deleted documents by query");
        Ok(deleted)
    }
}
