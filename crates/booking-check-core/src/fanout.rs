//! Fan-out of scrape results into per-recipient deliveries.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::broker::{BrokerMessage, MessageHandler, Publisher};
use crate::error::Error;
use crate::message::{ScrapeResultMessage, NOTIFY_TOPIC};
use crate::registry::{run_blocking, RecipientId, SharedRegistry};

/// What happened to one scrape-result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// The payload did not decode; nothing was published.
    Malformed,
    /// A debug event arrived while debug is off (or unknown).
    DebugSuppressed,
    /// The subscriber set could not be read; nothing was published.
    RegistryUnavailable,
    /// Deliveries were attempted for every target.
    Published {
        /// Deliveries handed to the broker.
        delivered: usize,
        /// Deliveries the broker refused.
        failed: usize,
    },
}

/// Turns each `scrapper.result` event into `notify` messages.
///
/// Regular events go to every subscriber. Debug events go only to the owner
/// and only while the debug flag is set; a registry failure while reading the
/// flag counts as "off" so debug output never reaches real subscribers.
pub struct FanoutCoordinator {
    registry: SharedRegistry,
    publisher: Arc<dyn Publisher>,
    owner: RecipientId,
}

impl FanoutCoordinator {
    /// Create a new coordinator.
    pub fn new(registry: SharedRegistry, publisher: Arc<dyn Publisher>, owner: RecipientId) -> Self {
        Self {
            registry,
            publisher,
            owner,
        }
    }

    /// Process one raw `scrapper.result` payload.
    pub async fn handle_payload(&self, payload: &[u8]) -> FanoutOutcome {
        let event = match ScrapeResultMessage::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping malformed scrape result"
                );
                return FanoutOutcome::Malformed;
            }
        };

        self.fan_out(&event).await
    }

    /// Publish the deliveries for a decoded event.
    pub async fn fan_out(&self, event: &ScrapeResultMessage) -> FanoutOutcome {
        let targets = if event.debug {
            match run_blocking(&self.registry, |r| r.debug_enabled()).await {
                Ok(true) => vec![self.owner],
                Ok(false) => return FanoutOutcome::DebugSuppressed,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read debug status, assuming disabled");
                    return FanoutOutcome::DebugSuppressed;
                }
            }
        } else {
            match run_blocking(&self.registry, |r| r.subscribers()).await {
                Ok(subs) => subs,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read subscribers, dropping scrape result");
                    return FanoutOutcome::RegistryUnavailable;
                }
            }
        };

        let mut delivered = 0;
        let mut failed = 0;
        for recipient in targets {
            match self.publish_delivery(event, recipient).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        topic = NOTIFY_TOPIC,
                        recipient,
                        message = %event.message,
                        error = %e,
                        "failed to publish delivery"
                    );
                }
            }
        }

        tracing::debug!(debug = event.debug, delivered, failed, "scrape result fanned out");
        FanoutOutcome::Published { delivered, failed }
    }

    async fn publish_delivery(
        &self,
        event: &ScrapeResultMessage,
        recipient: RecipientId,
    ) -> Result<(), Error> {
        let payload = event.delivery_for(recipient).encode()?;
        self.publisher.publish(NOTIFY_TOPIC, Bytes::from(payload)).await
    }
}

#[async_trait]
impl MessageHandler for FanoutCoordinator {
    async fn handle(&self, message: BrokerMessage) {
        self.handle_payload(&message.payload).await;
    }
}
