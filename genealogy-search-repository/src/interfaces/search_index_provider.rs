//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search engine operations, allowing for
//! different backend implementations (OpenSearch, in-memory).

use async_trait::async_trait;
use serde_json::Value;

use crate::dsl::{Query, SearchDefinition};
use crate::errors::SearchIndexError;
use crate::types::{BatchOperationSummary, BulkIndexItem, RawSearchResponse};

/// Abstracts the underlying search engine against one named index.
///
/// Implementations are injected into the indexing pipeline and the search executor so
/// the core can be tested with in-memory or mock backends.
///
/// # Index Initialization
///
/// Call `ensure_index_exists` during application startup so the index and its mappings
/// exist before any document operation.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Ensure the search index exists, creating it with its mappings if necessary.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Index (or replace) many documents by ID.
    ///
    /// # Arguments
    ///
    /// * `items` - Documents to index
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-item outcomes; rejected items carry the engine reason
    /// * `Err(SearchIndexError)` - If the bulk request fails entirely
    async fn bulk_index(
        &self,
        items: &[BulkIndexItem],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Execute a search. Total hits are always tracked exactly.
    async fn search(
        &self,
        definition: &SearchDefinition,
    ) -> Result<RawSearchResponse, SearchIndexError>;

    /// Fetch a document `_source` by ID.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Value))` - The stored source
    /// * `Ok(None)` - If no document has that ID
    /// * `Err(SearchIndexError)` - If the request fails
    async fn get(&self, doc_id: &str) -> Result<Option<Value>, SearchIndexError>;

    /// Delete every document matching `query`, returning how many were deleted.
    async fn delete_by_query(&self, query: &Query) -> Result<u64, SearchIndexError>;
}
