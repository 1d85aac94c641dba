use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use retex_core::notify::NotificationDispatcher;
use retex_core::BoxError;
use retex_shared::models::events::{
    CheckoutCompletedEvent, OrderPlacedEvent, OrderStatusChangedEvent,
};

pub const ORDER_PLACED_TOPIC: &str = "retex.orders.placed";
pub const CHECKOUT_COMPLETED_TOPIC: &str = "retex.checkouts.completed";
pub const ORDER_STATUS_TOPIC: &str = "retex.orders.status";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Kafka-backed notification boundary. Payloads are the JSON event
/// structs; the message key is the order (or buyer) id so per-entity
/// ordering holds within a partition.
#[derive(Clone)]
pub struct KafkaDispatcher {
    producer: EventProducer,
}

impl KafkaDispatcher {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl NotificationDispatcher for KafkaDispatcher {
    async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), BoxError> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(ORDER_PLACED_TOPIC, &event.order_id.to_string(), &payload)
            .await?;
        Ok(())
    }

    async fn checkout_completed(&self, event: &CheckoutCompletedEvent) -> Result<(), BoxError> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(
                CHECKOUT_COMPLETED_TOPIC,
                &event.buyer_id.to_string(),
                &payload,
            )
            .await?;
        Ok(())
    }

    async fn order_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), BoxError> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(ORDER_STATUS_TOPIC, &event.order_id.to_string(), &payload)
            .await?;
        Ok(())
    }
}
