//! In-process message bus.
//!
//! Stands in for the durable topic transport producers publish to. Each
//! topic is a bounded mpsc channel with exactly one subscriber; messages on a
//! topic are delivered in publish order.

use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::BusConfig;
use crate::error::ConsumerError;

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("topic {0} is closed")]
    Closed(String),
    #[error("topic {0} already has a subscriber")]
    AlreadySubscribed(String),
}

/// One message: string headers plus an opaque body.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub id: Uuid,
    pub headers: HashMap<String, String>,
    pub data: Bytes,
}

impl BusMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            headers: HashMap::new(),
            data: data.into(),
        }
    }

    /// A message whose body is `value` encoded as JSON.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// A header the consumer cannot do without.
    pub fn require_header(&self, name: &str) -> Result<&str, ConsumerError> {
        self.header(name)
            .ok_or_else(|| ConsumerError::missing_header(name))
    }

    /// Decode the body as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConsumerError> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

struct Topic {
    tx: mpsc::Sender<BusMessage>,
    rx: Option<mpsc::Receiver<BusMessage>>,
}

/// Named topics, created on first use.
pub struct EventBus {
    prefix: String,
    capacity: usize,
    topics: DashMap<String, Topic>,
}

impl EventBus {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            prefix: config.topic_prefix.clone(),
            capacity: config.channel_capacity.max(1),
            topics: DashMap::new(),
        }
    }

    fn full_name(&self, topic: &str) -> String {
        if self.prefix.is_empty() {
            topic.to_string()
        } else {
            format!("{}.{}", self.prefix, topic)
        }
    }

    fn sender(&self, topic: &str) -> mpsc::Sender<BusMessage> {
        self.topics
            .entry(self.full_name(topic))
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.capacity);
                Topic { tx, rx: Some(rx) }
            })
            .tx
            .clone()
    }

    /// Publish a message, waiting for room if the topic is full.
    pub async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), BusError> {
        let tx = self.sender(topic);
        tx.send(message)
            .await
            .map_err(|_| BusError::Closed(self.full_name(topic)))
    }

    /// Take the single receiving end of `topic`.
    pub fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<BusMessage>, BusError> {
        let name = self.full_name(topic);
        // Make sure the topic exists.
        self.sender(topic);
        let rx = self.topics.get_mut(&name).and_then(|mut t| t.rx.take());
        rx.ok_or(BusError::AlreadySubscribed(name))
    }
}
