//! Loader module for the indexing pipeline.
//!
//! A bulk indexer with a fixed pool of workers. Documents are queued with [`BulkIndexer::add`]
//! and workers drain the queue in chunks of up to `flush_documents`, sending each chunk to
//! the engine as one bulk request. Per-document outcomes are tallied in atomic counters and
//! read back from [`BulkIndexer::close`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use genealogy_search_repository::{BulkIndexItem, SearchIndexProvider};

use crate::errors::PipelineError;

/// Configuration for the bulk indexer.
#[derive(Debug, Clone)]
pub struct BulkIndexerConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Maximum documents per bulk request.
    pub flush_documents: usize,
    /// Documents that may wait in the queue before `add` blocks.
    pub queue_capacity: usize,
}

impl Default for BulkIndexerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            flush_documents: 100,
            queue_capacity: 1000,
        }
    }
}

/// Counters reported by a bulk indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkIndexerStats {
    pub num_added: u64,
    pub num_indexed: u64,
    pub num_failed: u64,
    pub num_requests: u64,
}

#[derive(Default)]
struct Counters {
    added: AtomicU64,
    indexed: AtomicU64,
    failed: AtomicU64,
    requests: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BulkIndexerStats {
        BulkIndexerStats {
            num_added: self.added.load(Ordering::Relaxed),
            num_indexed: self.indexed.load(Ordering::Relaxed),
            num_failed: self.failed.load(Ordering::Relaxed),
            num_requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

/// Bulk indexer backed by a worker pool.
pub struct BulkIndexer {
    sender: Mutex<Option<mpsc::Sender<BulkIndexItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl BulkIndexer {
    /// Start the workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: BulkIndexerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let flush_documents = config.flush_documents.max(1);

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&provider),
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                    flush_documents,
                ))
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Queue one document; waits while the queue is full.
    pub async fn add(&self, item: BulkIndexItem) -> Result<(), PipelineError> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or_else(|| PipelineError::channel("bulk indexer is closed"))?;
        sender
            .send(item)
            .await
            .map_err(|_| PipelineError::channel("bulk indexer workers stopped"))?;
        self.counters.added.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting documents, wait for the workers to drain the queue and return the
    /// final counters. Later calls return the same counters without waiting.
    pub async fn close(&self) -> Result<BulkIndexerStats, PipelineError> {
        self.sender.lock().await.take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            worker
                .await
                .map_err(|e| PipelineError::channel(format!("bulk indexer worker failed: {}", e)))?;
        }
        Ok(self.stats())
    }

    pub fn stats(&self) -> BulkIndexerStats {
        self.counters.snapshot()
    }
}

async fn run_worker(
    worker_id: usize,
    provider: Arc<dyn SearchIndexProvider>,
    receiver: Arc<Mutex<mpsc::Receiver<BulkIndexItem>>>,
    counters: Arc<Counters>,
    flush_documents: usize,
) {
    loop {
        let mut chunk = Vec::with_capacity(flush_documents);
        {
            let mut receiver = receiver.lock().await;
            match receiver.recv().await {
                Some(item) => chunk.push(item),
                None => break,
            }
            while chunk.len() < flush_documents {
                match receiver.try_recv() {
                    Ok(item) => chunk.push(item),
                    Err(_) => break,
                }
            }
        }
        flush(worker_id, provider.as_ref(), &counters, &chunk).await;
    }
    debug!(worker_id = worker_id, "Bulk indexer worker finished");
}

async fn flush(
    worker_id: usize,
    provider: &dyn SearchIndexProvider,
    counters: &Counters,
    chunk: &[BulkIndexItem],
) {
    counters.requests.fetch_add(1, Ordering::Relaxed);
    debug!(worker_id = worker_id, count = chunk.len(), "Flushing documents to search index");

    match provider.bulk_index(chunk).await {
        Ok(summary) => {
            counters
                .indexed
                .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
            counters
                .failed
                .fetch_add(summary.failed as u64, Ordering::Relaxed);
            if summary.failed > 0 {
                warn!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Bulk index completed with some failures"
                );
                for result in summary.results.iter().filter(|r| !r.success) {
                    error!(
                        doc_id = %result.doc_id,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Failed to index document"
                    );
                }
            }
        }
        Err(e) => {
            counters
                .failed
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
            error!(error = %e, count = chunk.len(), "Failed to bulk index documents");
        }
    }
}
