//! Orchestrator module for the publisher worker.
//!
//! Consumes `publisher` messages and drives each post through its publish or unpublish
//! transitions: the post is marked in progress, the indexing pipeline (or the delete by
//! post) runs, and the outcome is written back on a fresh read of the post.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use genealogy_search_repository::ContentStore;
use genealogy_search_shared::{
    Post, PostStatus, PublisherAction, PublisherMessage, RequestContext,
};

use crate::consumer::Subscription;
use crate::errors::PipelineError;
use crate::pipeline::IndexingPipeline;
use crate::search::SearchExecutor;
use crate::text::strip_bom;

/// Counters reported by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub messages_processed: u64,
    pub posts_indexed: u64,
    pub posts_unindexed: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    messages: AtomicU64,
    indexed: AtomicU64,
    unindexed: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            messages_processed: self.messages.load(Ordering::Relaxed),
            posts_indexed: self.indexed.load(Ordering::Relaxed),
            posts_unindexed: self.unindexed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Statuses a post moves through for one action.
struct Transition {
    from: [PostStatus; 2],
    running: PostStatus,
    done: PostStatus,
    failed: PostStatus,
}

const PUBLISH: Transition = Transition {
    from: [PostStatus::ToPublish, PostStatus::PublishError],
    running: PostStatus::Publishing,
    done: PostStatus::Published,
    failed: PostStatus::PublishError,
};

const UNPUBLISH: Transition = Transition {
    from: [PostStatus::ToUnpublish, PostStatus::UnpublishError],
    running: PostStatus::Unpublishing,
    done: PostStatus::Draft,
    failed: PostStatus::UnpublishError,
};

/// Worker that publishes and unpublishes posts.
pub struct PublisherWorker {
    store: Arc<dyn ContentStore>,
    pipeline: IndexingPipeline,
    executor: Arc<SearchExecutor>,
    shutdown_tx: broadcast::Sender<()>,
    counters: Arc<Counters>,
}

impl PublisherWorker {
    pub fn new(
        store: Arc<dyn ContentStore>,
        pipeline: IndexingPipeline,
        executor: Arc<SearchExecutor>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            store,
            pipeline,
            executor,
            shutdown_tx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Consume `subscription` until it closes, a shutdown is requested or the process is
    /// interrupted. Failed messages are logged and acknowledged; the failure is recorded on
    /// the post.
    #[instrument(skip(self, subscription))]
    pub async fn run<S: Subscription + ?Sized>(
        &self,
        subscription: &mut S,
    ) -> Result<(), PipelineError> {
        info!("Starting publisher worker");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let counters = Arc::clone(&self.counters);
        let mut progress_timer = interval(Duration::from_secs(10));
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Track previous values for rate calculation
        let mut prev_messages: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Publisher worker received shutdown signal");
                    break;
                }
                delivery = subscription.receive() => {
                    match delivery {
                        Ok(Some(delivery)) => {
                            if let Err(e) = self.process_message(&delivery.body).await {
                                error!(error = %e, "Failed to process publisher message");
                            }
                            if let Err(e) = subscription.ack(&delivery).await {
                                error!(error = %e, "Failed to acknowledge publisher message");
                            }
                        }
                        Ok(None) => {
                            info!("Subscription closed");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to receive publisher message");
                            return Err(e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let stats = counters.snapshot();

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let messages_per_sec = if elapsed_secs > 0.0 {
                        (stats.messages_processed.saturating_sub(prev_messages) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        messages_processed = stats.messages_processed,
                        posts_indexed = stats.posts_indexed,
                        posts_unindexed = stats.posts_unindexed,
                        failures = stats.failures,
                        messages_per_sec = format!("{:.2}", messages_per_sec),
                        "Processing progress"
                    );

                    prev_messages = stats.messages_processed;
                    prev_time = now;
                }
            }
        }

        let stats = self.stats();
        info!(
            messages_processed = stats.messages_processed,
            posts_indexed = stats.posts_indexed,
            posts_unindexed = stats.posts_unindexed,
            failures = stats.failures,
            "Publisher worker shutdown complete"
        );
        Ok(())
    }

    /// Process every message of a batch, returning the last error so the batch is retried.
    pub async fn process_batch(&self, bodies: &[Vec<u8>]) -> Result<(), PipelineError> {
        let mut last_error = None;
        for body in bodies {
            if let Err(e) = self.process_message(body).await {
                error!(error = %e, "Failed to process publisher message");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Process one `publisher` message.
    ///
    /// Bodies that do not decode are dropped with a warning and reported as success, so
    /// they are never redelivered.
    pub async fn process_message(&self, body: &[u8]) -> Result<(), PipelineError> {
        self.counters.messages.fetch_add(1, Ordering::Relaxed);

        let message: PublisherMessage = match serde_json::from_slice(strip_bom(body)) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Dropping unparsable publisher message"
                );
                return Ok(());
            }
        };

        let ctx = RequestContext::system(message.society_id);
        let result = match message.action {
            PublisherAction::Index => self.publish(&ctx, message.post_id).await,
            PublisherAction::Unindex => self.unpublish(&ctx, message.post_id).await,
        };
        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    #[instrument(skip(self), fields(society_id = ctx.society_id))]
    async fn publish(&self, ctx: &RequestContext, post_id: u32) -> Result<(), PipelineError> {
        let Some(post) = self.begin(ctx, post_id, &PUBLISH).await? else {
            return Ok(());
        };

        let outcome = self.pipeline.index_post(ctx, &post).await.map(|summary| {
            info!(
                records = summary.records,
                documents = summary.documents,
                "Post published"
            );
        });
        self.finish(ctx, post_id, &PUBLISH, &outcome).await?;
        if outcome.is_ok() {
            self.counters.indexed.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    #[instrument(skip(self), fields(society_id = ctx.society_id))]
    async fn unpublish(&self, ctx: &RequestContext, post_id: u32) -> Result<(), PipelineError> {
        if self.begin(ctx, post_id, &UNPUBLISH).await?.is_none() {
            return Ok(());
        }

        let outcome = self
            .executor
            .search_delete_by_post(ctx, post_id)
            .await
            .map(|deleted| info!(deleted = deleted, "Post unpublished"))
            .map_err(PipelineError::from);
        self.finish(ctx, post_id, &UNPUBLISH, &outcome).await?;
        if outcome.is_ok() {
            self.counters.unindexed.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Move the post into the running status, or `None` when it is not waiting for this
    /// action.
    async fn begin(
        &self,
        ctx: &RequestContext,
        post_id: u32,
        transition: &Transition,
    ) -> Result<Option<Post>, PipelineError> {
        let mut post = self.store.select_post(ctx.society_id, post_id).await?;
        if !transition.from.contains(&post.post_status) {
            info!(
                post_id = post_id,
                status = ?post.post_status,
                "Post is not waiting for this action, dropping message"
            );
            return Ok(None);
        }

        post.post_status = transition.running;
        let post = self.store.update_post(ctx.society_id, &post).await?;
        debug!(post_id = post_id, status = ?post.post_status, "Post status updated");
        Ok(Some(post))
    }

    /// Record the outcome on a fresh read of the post.
    async fn finish(
        &self,
        ctx: &RequestContext,
        post_id: u32,
        transition: &Transition,
        outcome: &Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let mut post = self.store.select_post(ctx.society_id, post_id).await?;
        match outcome {
            Ok(()) => {
                post.post_status = transition.done;
                post.post_error = None;
            }
            Err(e) => {
                error!(post_id = post_id, error = %e, "Post action failed");
                post.post_status = transition.failed;
                post.post_error = Some(e.to_string());
            }
        }
        self.store.update_post(ctx.society_id, &post).await?;
        debug!(post_id = post_id, status = ?post.post_status, "Post status updated");
        Ok(())
    }

    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::BulkIndexerConfig;
    use crate::names::NameVariantLookup;
    use crate::query::QueryBuilder;
    use crate::standardize::{BatcherConfig, PlaceStandardizer};
    use chrono::Utc;
    use genealogy_search_repository::{
        InMemoryContentStore, InMemoryGazetteer, InMemorySearchIndex,
    };
    use genealogy_search_shared::{
        Collection, CollectionMapping, ImagesStatus, IxField, PlaceSettings, PrivacyLevel,
        Record, Role,
    };

    struct Fixture {
        worker: PublisherWorker,
        store: Arc<InMemoryContentStore>,
        index: Arc<InMemorySearchIndex>,
        post_id: u32,
    }

    async fn fixture(status: PostStatus) -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let gazetteer = Arc::new(InMemoryGazetteer::new(PlaceSettings::default()));
        let standardizer = Arc::new(PlaceStandardizer::with_settings(
            gazetteer.clone(),
            PlaceSettings::default(),
            BatcherConfig::default(),
        ));
        let pipeline = IndexingPipeline::new(
            store.clone(),
            index.clone(),
            standardizer,
            BulkIndexerConfig::default(),
        );
        let executor = Arc::new(SearchExecutor::new(
            index.clone(),
            store.clone(),
            QueryBuilder::new(Arc::new(NameVariantLookup::new(gazetteer))),
        ));

        let collection = store
            .insert_collection(
                1,
                &Collection {
                    id: 0,
                    society_id: 1,
                    name: "Bedrock births".to_string(),
                    category_ids: vec![],
                    mappings: vec![
                        CollectionMapping::new("Given", Role::Principal, IxField::Given),
                        CollectionMapping::new("Surname", Role::Principal, IxField::Surname),
                    ],
                    household_number_header: None,
                    household_relationship_header: None,
                    gender_header: None,
                    image_path_header: None,
                    citation_template: String::new(),
                    location: None,
                    privacy_level: PrivacyLevel::PUBLIC,
                    last_modified: Utc::now(),
                },
            )
            .await
            .unwrap();
        let post = store
            .insert_post(
                1,
                &Post {
                    id: 0,
                    society_id: 1,
                    collection_id: collection.id,
                    name: "1900".to_string(),
                    records_key: String::new(),
                    images_key: String::new(),
                    post_status: status,
                    images_status: ImagesStatus::ToLoad,
                    post_error: None,
                    last_modified: Utc::now(),
                },
            )
            .await
            .unwrap();
        store
            .insert_records(
                1,
                post.id,
                &[Record {
                    id: 0,
                    society_id: 1,
                    post_id: post.id,
                    data: [("Given", "Fred"), ("Surname", "Flintstone")]
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    ix_hash: None,
                    last_modified: Utc::now(),
                }],
            )
            .await
            .unwrap();

        Fixture {
            worker: PublisherWorker::new(store.clone(), pipeline, executor),
            store,
            index,
            post_id: post.id,
        }
    }

    fn body(message: &PublisherMessage) -> Vec<u8> {
        serde_json::to_vec(message).unwrap()
    }

    async fn status(f: &Fixture) -> Post {
        f.store.select_post(1, f.post_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_index_publishes_post() {
        let f = fixture(PostStatus::ToPublish).await;

        f.worker
            .process_message(&body(&PublisherMessage::index(1, f.post_id)))
            .await
            .unwrap();

        let post = status(&f).await;
        assert_eq!(post.post_status, PostStatus::Published);
        assert!(post.post_error.is_none());
        assert_eq!(f.index.len(), 1);
        assert_eq!(f.worker.stats().posts_indexed, 1);
    }

    #[tokio::test]
    async fn test_index_failure_is_recorded() {
        let f = fixture(PostStatus::PublishError).await;
        let record_id = f.store.select_records_by_post(1, f.post_id).await.unwrap()[0].id;
        f.index.reject_document(record_id.to_string());

        let err = f
            .worker
            .process_message(&body(&PublisherMessage::index(1, f.post_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BulkFailures { failed: 1 }));

        let post = status(&f).await;
        assert_eq!(post.post_status, PostStatus::PublishError);
        assert_eq!(post.post_error.as_deref(), Some("1 documents failed to index"));
        assert_eq!(f.worker.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_message_for_wrong_status_is_dropped() {
        let f = fixture(PostStatus::Draft).await;

        f.worker
            .process_message(&body(&PublisherMessage::index(1, f.post_id)))
            .await
            .unwrap();
        assert_eq!(status(&f).await.post_status, PostStatus::Draft);
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_unindex_returns_post_to_draft() {
        let f = fixture(PostStatus::ToPublish).await;
        f.worker
            .process_message(&body(&PublisherMessage::index(1, f.post_id)))
            .await
            .unwrap();

        let mut post = status(&f).await;
        post.post_status = PostStatus::ToUnpublish;
        f.store.update_post(1, &post).await.unwrap();

        f.worker
            .process_message(&body(&PublisherMessage::unindex(1, f.post_id)))
            .await
            .unwrap();
        assert_eq!(status(&f).await.post_status, PostStatus::Draft);
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_is_dropped() {
        let f = fixture(PostStatus::ToPublish).await;

        f.worker.process_message(b"not json").await.unwrap();
        f.worker
            .process_message(br#"{"action":"reindex","societyId":1,"postID":1}"#)
            .await
            .unwrap();
        assert_eq!(status(&f).await.post_status, PostStatus::ToPublish);
        assert_eq!(f.worker.stats().messages_processed, 2);
    }

    #[tokio::test]
    async fn test_bom_prefixed_message_is_processed() {
        let f = fixture(PostStatus::ToPublish).await;
        let mut message = b"\xEF\xBB\xBF".to_vec();
        message.extend(body(&PublisherMessage::index(1, f.post_id)));

        f.worker.process_message(&message).await.unwrap();
        assert_eq!(status(&f).await.post_status, PostStatus::Published);
    }

    #[tokio::test]
    async fn test_batch_returns_last_error() {
        let f = fixture(PostStatus::ToPublish).await;

        let result = f
            .worker
            .process_batch(&[
                body(&PublisherMessage::index(1, f.post_id)),
                body(&PublisherMessage::index(2, f.post_id)),
                b"garbage".to_vec(),
            ])
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Domain(ref e) if e.is_not_found()));
        assert_eq!(status(&f).await.post_status, PostStatus::Published);
    }
}
