//! In-process broker for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::consumer::{Delivery, Subscription};
use crate::errors::PipelineError;

struct Topic {
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    receiver: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    acked: Arc<AtomicU64>,
}

impl Topic {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
            acked: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Topics backed by tokio channels. Each topic has a single subscriber; messages published
/// before it subscribes are kept.
#[derive(Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, Topic>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_topic<T>(
        &self,
        topic: &str,
        f: impl FnOnce(&mut Topic) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| PipelineError::channel("broker lock poisoned"))?;
        f(topics.entry(topic.to_string()).or_insert_with(Topic::new))
    }

    pub fn publish(&self, topic: &str, body: impl Into<Vec<u8>>) -> Result<(), PipelineError> {
        let body = body.into();
        self.with_topic(topic, |t| {
            t.sender
                .as_ref()
                .ok_or_else(|| PipelineError::channel(format!("topic {} is closed", topic)))?
                .send(body)
                .map_err(|_| PipelineError::channel(format!("topic {} has no subscriber", topic)))
        })
    }

    /// Take the topic's subscription. Fails if it was already taken.
    pub fn subscribe(&self, topic: &str) -> Result<MemorySubscription, PipelineError> {
        self.with_topic(topic, |t| {
            let receiver = t.receiver.take().ok_or_else(|| {
                PipelineError::channel(format!("topic {} already has a subscriber", topic))
            })?;
            Ok(MemorySubscription {
                receiver,
                acked: Arc::clone(&t.acked),
            })
        })
    }

    /// Stop accepting messages; the subscriber drains what is queued and then sees the end.
    pub fn close(&self, topic: &str) -> Result<(), PipelineError> {
        self.with_topic(topic, |t| {
            t.sender.take();
            Ok(())
        })
    }

    /// Messages acknowledged on a topic so far.
    pub fn acked(&self, topic: &str) -> u64 {
        self.with_topic(topic, |t| Ok(t.acked.load(Ordering::SeqCst)))
            .unwrap_or_default()
    }
}

/// Subscriber side of an [`InMemoryBroker`] topic.
pub struct MemorySubscription {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    acked: Arc<AtomicU64>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn receive(&mut self) -> Result<Option<Delivery>, PipelineError> {
        Ok(self.receiver.recv().await.map(Delivery::new))
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), PipelineError> {
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_before_subscribe_is_kept() {
        let broker = InMemoryBroker::new();
        broker.publish("publisher", "one").unwrap();

        let mut subscription = broker.subscribe("publisher").unwrap();
        broker.publish("publisher", "two").unwrap();
        broker.close("publisher").unwrap();

        let first = subscription.receive().await.unwrap().unwrap();
        assert_eq!(first.body, b"one");
        subscription.ack(&first).await.unwrap();
        let second = subscription.receive().await.unwrap().unwrap();
        assert_eq!(second.body, b"two");
        assert!(subscription.receive().await.unwrap().is_none());
        assert_eq!(broker.acked("publisher"), 1);
    }

    #[tokio::test]
    async fn test_single_subscriber() {
        let broker = InMemoryBroker::new();
        let _subscription = broker.subscribe("publisher").unwrap();
        assert!(broker.subscribe("publisher").is_err());

        broker.close("publisher").unwrap();
        assert!(broker.publish("publisher", "late").is_err());
    }
}
