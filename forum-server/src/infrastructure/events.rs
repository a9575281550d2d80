//! Post events published to the message broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::{
    ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::post::Post;
use crate::infrastructure::search::SearchFilters;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum EventError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Payload of the `post_created` event. Field names are the topic contract.
#[derive(Debug, Clone, Serialize)]
pub struct PostCreatedEvent {
    pub event_type: &'static str,
    pub post_id: Uuid,
    pub username: String,
    pub email: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub has_image: bool,
    pub has_text_file: bool,
    pub parent_post_id: Option<Uuid>,
}

impl From<&Post> for PostCreatedEvent {
    fn from(post: &Post) -> Self {
        Self {
            event_type: "post_created",
            post_id: post.id,
            username: post.username.clone(),
            email: post.email.clone(),
            text: post.text.clone(),
            timestamp: post.timestamp,
            has_image: post.image.is_some(),
            has_text_file: post.text_file.is_some(),
            parent_post_id: post.parent_post_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchQueryEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub query: Option<String>,
    pub filters: SearchFilters,
    pub results_count: u64,
    pub timestamp: DateTime<Utc>,
}

impl SearchQueryEvent {
    pub fn new(query: Option<String>, filters: SearchFilters, results_count: u64) -> Self {
        Self {
            kind: "search_query",
            query,
            filters,
            results_count,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, key: Option<&str>, payload: serde_json::Value)
    -> Result<(), EventError>;
}

#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, EventError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", "forum-server")
            .set("acks", "all")
            .set("message.timeout.ms", "10000")
            .create::<FutureProducer>()?;

        info!(brokers = %brokers, topic = %topic, "kafka producer initialized");

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(
        &self,
        key: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<(), EventError> {
        let body = serde_json::to_string(&payload)?;
        let mut record = FutureRecord::<str, str>::to(&self.topic).payload(&body);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _)| EventError::Kafka(err))?;

        debug!(topic = %self.topic, key = ?key, "event published");
        Ok(())
    }
}

/// Used when no brokers are configured.
pub struct DisabledPublisher;

#[async_trait]
impl EventPublisher for DisabledPublisher {
    async fn publish(
        &self,
        key: Option<&str>,
        _payload: serde_json::Value,
    ) -> Result<(), EventError> {
        debug!(key = ?key, "event publishing disabled, dropping event");
        Ok(())
    }
}

/// Fire-and-forget facade over a publisher; failures are logged, never returned.
#[derive(Clone)]
pub struct EventNotifier {
    publisher: Arc<dyn EventPublisher>,
}

impl EventNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledPublisher))
    }

    pub async fn post_created(&self, post: &Post) {
        let key = post.id.to_string();
        let payload = match serde_json::to_value(PostCreatedEvent::from(post)) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(post_id = %post.id, error = %err, "failed to encode post_created event");
                return;
            }
        };

        if let Err(err) = self.publisher.publish(Some(&key), payload).await {
            warn!(post_id = %post.id, error = %err, "failed to publish post_created event");
        }
    }

    pub async fn search_performed(&self, event: SearchQueryEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode search_query event");
                return;
            }
        };

        if let Err(err) = self.publisher.publish(None, payload).await {
            warn!(error = %err, "failed to publish search_query event");
        }
    }
}
