//! Consumer module for the publisher worker.
//!
//! Provides the pub/sub subscriptions the worker reads `publisher` messages from: Kafka
//! for deployments and an in-process broker for local runs and tests.

mod backoff;
mod kafka_subscription;
mod memory_broker;
mod topic_url;

use async_trait::async_trait;

use crate::errors::PipelineError;

pub use backoff::ReconnectBackoff;
pub use kafka_subscription::KafkaSubscription;
pub use memory_broker::{InMemoryBroker, MemorySubscription};
pub use topic_url::TopicUrl;

/// Position of a delivered Kafka message, committed on ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// One message taken from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: Vec<u8>,
    /// Set for Kafka deliveries; in-process deliveries have no offset.
    pub offset: Option<KafkaOffset>,
}

impl Delivery {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            offset: None,
        }
    }
}

/// A source of messages for one topic.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message. `Ok(None)` means the topic is closed.
    async fn receive(&mut self) -> Result<Option<Delivery>, PipelineError>;

    /// Acknowledge a message so it is not delivered again.
    async fn ack(&mut self, delivery: &Delivery) -> Result<(), PipelineError>;
}
