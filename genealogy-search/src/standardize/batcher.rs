//! Request batching in front of a keyed lookup.
//!
//! Callers ask for one key at a time; a single listener task accumulates the requests and
//! issues one lookup per batch. A batch is sent when it reaches `max_batch_size` requests or
//! when `window` has elapsed since the first request of the batch, whichever comes first.
//! Both triggers run on the listener task, so a batch is only ever submitted once.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use genealogy_search_shared::DomainError;

/// Size trigger.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;
/// Time trigger.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(10);
/// Resolved values kept per batcher.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Loads a batch of keys; keys absent from the returned map are unknown.
#[async_trait]
pub trait BatchLoader<K, V>: Send + Sync {
    async fn load(&self, keys: Vec<K>) -> Result<HashMap<K, V>, DomainError>;
}

/// Configuration for a [`Batcher`].
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub max_batch_size: usize,
    pub window: Duration,
    /// Bound of the moka result cache (TinyLFU eviction, not strict LRU).
    pub cache_capacity: u64,
    /// Capacity of the request channel.
    pub channel_buffer_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            window: DEFAULT_WINDOW,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            channel_buffer_size: 1000,
        }
    }
}

type Reply<V> = oneshot::Sender<Result<Option<V>, DomainError>>;

struct BatchRequest<K, V> {
    key: K,
    reply: Reply<V>,
}

/// Batched, cached lookups by key.
pub struct Batcher<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    sender: mpsc::Sender<BatchRequest<K, V>>,
    cache: Cache<K, V>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<K, V> Batcher<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Spawn the listener task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        name: &'static str,
        loader: Arc<dyn BatchLoader<K, V>>,
        config: BatcherConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_buffer_size);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let cache = Cache::builder().max_capacity(config.cache_capacity).build();

        let listener = Listener {
            name,
            loader,
            cache: cache.clone(),
            max_batch_size: config.max_batch_size.max(1),
            window: config.window,
        };
        tokio::spawn(listener.run(receiver, shutdown_rx));

        Self {
            name,
            sender,
            cache,
            shutdown_tx,
        }
    }

    /// Look up one key; `Ok(None)` when the loader does not know it.
    pub async fn get(&self, key: K) -> Result<Option<V>, DomainError> {
        if let Some(value) = self.cache.get(&key).await {
            return Ok(Some(value));
        }

        let (reply, response) = oneshot::channel();
        self.sender
            .send(BatchRequest { key, reply })
            .await
            .map_err(|_| DomainError::other(format!("{} batcher stopped", self.name)))?;
        response
            .await
            .map_err(|_| DomainError::other(format!("{} batcher dropped request", self.name)))?
    }

    /// Look up many keys; concurrent requests share batches.
    pub async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, DomainError> {
        let lookups = keys.iter().map(|key| async move {
            self.get(key.clone())
                .await
                .map(|value| value.map(|v| (key.clone(), v)))
        });
        let results = futures::future::join_all(lookups).await;

        let mut found = HashMap::with_capacity(keys.len());
        for result in results {
            if let Some((key, value)) = result? {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Stop the listener; pending requests fail with a cancellation error.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

struct Listener<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    loader: Arc<dyn BatchLoader<K, V>>,
    cache: Cache<K, V>,
    max_batch_size: usize,
    window: Duration,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<K, V> Listener<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn run(
        self,
        mut requests: mpsc::Receiver<BatchRequest<K, V>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut pending: HashMap<K, Vec<Reply<V>>> = HashMap::new();
        let mut pending_requests = 0usize;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(batcher = self.name, pending = pending_requests, "Batcher shutting down");
                    for reply in pending.drain().flat_map(|(_, replies)| replies) {
                        let _ = reply.send(Err(DomainError::other(format!(
                            "{} lookup cancelled",
                            self.name
                        ))));
                    }
                    break;
                }
                request = requests.recv() => match request {
                    Some(BatchRequest { key, reply }) => {
                        pending.entry(key).or_default().push(reply);
                        pending_requests += 1;
                        if pending_requests >= self.max_batch_size {
                            deadline = None;
                            pending_requests = 0;
                            self.submit(std::mem::take(&mut pending));
                        } else if deadline.is_none() {
                            deadline = Some(Instant::now() + self.window);
                        }
                    }
                    None => {
                        if !pending.is_empty() {
                            self.submit(std::mem::take(&mut pending));
                        }
                        break;
                    }
                },
                _ = wait_for(deadline) => {
                    deadline = None;
                    pending_requests = 0;
                    self.submit(std::mem::take(&mut pending));
                }
            }
        }
    }

    /// Run one lookup for the batch and fan the results back out.
    fn submit(&self, batch: HashMap<K, Vec<Reply<V>>>) {
        if batch.is_empty() {
            return;
        }
        let name = self.name;
        let loader = Arc::clone(&self.loader);
        let cache = self.cache.clone();

        tokio::spawn(async move {
            let keys: Vec<K> = batch.keys().cloned().collect();
            debug!(batcher = name, keys = keys.len(), "Submitting batch");

            match loader.load(keys).await {
                Ok(found) => {
                    for (key, replies) in batch {
                        let value = found.get(&key).cloned();
                        if let Some(value) = &value {
                            cache.insert(key, value.clone()).await;
                        }
                        for reply in replies {
                            let _ = reply.send(Ok(value.clone()));
                        }
                    }
                }
                Err(e) => {
                    warn!(batcher = name, error = %e, "Batch lookup failed");
                    for reply in batch.into_values().flatten() {
                        let _ = reply.send(Err(e.clone()));
                    }
                }
            }
        });
    }
}
