//! Indexing pipeline.
//!
//! Indexes every record of one post: reads the collection, categories, records and
//! households, builds the documents and sends them through a [`BulkIndexer`]. Any read
//! failure aborts the run; per-document engine failures are counted and reported as one
//! error once the indexer has drained.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use genealogy_search_repository::{BulkIndexItem, ContentStore, SearchIndexProvider};
use genealogy_search_shared::{Post, RequestContext};

use crate::errors::PipelineError;
use crate::household::HouseholdIndex;
use crate::loader::{BulkIndexer, BulkIndexerConfig, BulkIndexerStats};
use crate::processor::RecordProcessor;
use crate::standardize::PlaceStandardizer;

/// Outcome of indexing one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub records: usize,
    pub documents: u64,
    pub stats: BulkIndexerStats,
}

/// Turns a post's records into indexed documents.
pub struct IndexingPipeline {
    store: Arc<dyn ContentStore>,
    index: Arc<dyn SearchIndexProvider>,
    processor: RecordProcessor,
    config: BulkIndexerConfig,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        index: Arc<dyn SearchIndexProvider>,
        standardizer: Arc<PlaceStandardizer>,
        config: BulkIndexerConfig,
    ) -> Self {
        Self {
            store,
            index,
            processor: RecordProcessor::new(standardizer),
            config,
        }
    }

    /// Index every record of `post` for the acting tenant.
    ///
    /// Re-indexing a post replaces its documents, since document IDs are stable.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexSummary)` - Every document was accepted by the engine
    /// * `Err(PipelineError::BulkFailures)` - The engine rejected at least one document
    /// * `Err(_)` - A read or standardization failed; nothing was submitted after it
    #[instrument(skip(self, post), fields(society_id = ctx.society_id, post_id = post.id))]
    pub async fn index_post(
        &self,
        ctx: &RequestContext,
        post: &Post,
    ) -> Result<IndexSummary, PipelineError> {
        let society_id = ctx.society_id;
        let collection = self
            .store
            .select_collection(society_id, post.collection_id)
            .await?;
        let categories = self
            .store
            .select_categories_by_id(society_id, &collection.category_ids)
            .await?;
        let records = self.store.select_records_by_post(society_id, post.id).await?;
        let households = self
            .store
            .select_record_households_by_post(society_id, post.id)
            .await?;
        debug!(
            records = records.len(),
            households = households.len(),
            "Loaded post content"
        );

        let household_index = HouseholdIndex::new(&households, &records);
        let mut scope = self.processor.scope(post, &collection, &categories).await?;
        let indexer = BulkIndexer::new(Arc::clone(&self.index), self.config.clone());

        let submitted = async {
            for record in &records {
                let documents = self
                    .processor
                    .process_record(&mut scope, record, &household_index)
                    .await?;
                for document in documents {
                    indexer
                        .add(BulkIndexItem {
                            doc_id: document.id.clone(),
                            body: document.to_source(),
                        })
                        .await?;
                }
            }
            Ok::<(), PipelineError>(())
        }
        .await;
        let stats = indexer.close().await?;
        submitted?;

        if stats.num_failed > 0 {
            return Err(PipelineError::bulk_failures(stats.num_failed));
        }

        info!(
            records = records.len(),
            documents = stats.num_indexed,
            requests = stats.num_requests,
            "Indexed post"
        );
        Ok(IndexSummary {
            records: records.len(),
            documents: stats.num_indexed,
            stats,
        })
    }
}
