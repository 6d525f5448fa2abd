//! Kafka subscription for `publisher` messages.

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message as KafkaMessage,
    Offset, TopicPartitionList,
};
use tracing::{debug, info};

use crate::consumer::{Delivery, KafkaOffset, Subscription};
use crate::errors::PipelineError;

/// Kafka consumer bound to one topic. Offsets are committed only on ack, so a message
/// that was received but never acknowledged is delivered again after a restart.
pub struct KafkaSubscription {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSubscription {
    /// Create a consumer and subscribe it to `topic`.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - The topic to read
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaSubscription)` - A subscribed consumer
    /// * `Err(PipelineError)` - If consumer creation or subscription fails
    pub fn connect(brokers: &str, group_id: &str, topic: &str) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;
        consumer.subscribe(&[topic])?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            topic = %topic,
            "Subscribed to Kafka topic"
        );

        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn receive(&mut self) -> Result<Option<Delivery>, PipelineError> {
        let msg = self.consumer.recv().await?;
        debug!(
            topic = %msg.topic(),
            partition = msg.partition(),
            offset = msg.offset(),
            "Received message from Kafka"
        );
        Ok(Some(Delivery {
            body: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            offset: Some(KafkaOffset {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
            }),
        }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), PipelineError> {
        let Some(position) = &delivery.offset else {
            return Ok(());
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        debug!(
            topic = %self.topic,
            partition = position.partition,
            offset = position.offset,
            "Committed offset"
        );
        Ok(())
    }
}
