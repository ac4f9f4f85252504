//! Topic-based publish/subscribe.
//!
//! The broker knows nothing about the payloads it carries. Handlers are
//! registered per topic and invoked once per published message.

mod local;
mod nats;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinError;

use crate::error::Error;

pub use local::{LocalBroker, DEFAULT_QUEUE_CAPACITY};
pub use nats::NatsBroker;

/// A message received from a topic.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Raw payload.
    pub payload: Bytes,
}

impl BrokerMessage {
    /// Create a new message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publishing half of the broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error>;
}

/// Reacts to messages delivered on a subscribed topic.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message. Handlers own their error reporting.
    async fn handle(&self, message: BrokerMessage);
}

/// Full broker capability.
#[async_trait]
pub trait Broker: Publisher {
    /// Register a handler for every message published on `topic`.
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error>;

    /// Stop delivering, wait for in-flight handlers and refuse further work.
    async fn shutdown(&self);
}

/// Log a handler task that panicked.
pub(crate) fn report_handler_result(topic: &str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(topic, error = %e, "message handler panicked");
    }
}
