//! Delivery of `notify` messages through the chat gateway.

use std::sync::Arc;

use async_trait::async_trait;

use crate::broker::{BrokerMessage, MessageHandler};
use crate::gateway::{DeliveryGateway, TextFormat};
use crate::message::DeliveryMessage;

/// What happened to one delivery message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The payload did not decode; nothing was sent.
    Malformed,
    /// The text could not be sent; the image step was skipped.
    TextFailed,
    /// Text sent, no image attached.
    TextSent,
    /// Text sent, the attached image was not valid base64.
    ImageInvalid,
    /// Text sent, the photo send failed.
    PhotoFailed,
    /// Text and photo both sent.
    TextAndPhotoSent,
}

/// Sends each delivery message at most once.
///
/// The text always goes first. A failed text send means the recipient is
/// unreachable, so the photo is not attempted. Nothing is retried.
pub struct DeliveryDispatcher {
    gateway: Arc<dyn DeliveryGateway>,
}

impl DeliveryDispatcher {
    /// Create a new dispatcher.
    pub fn new(gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self { gateway }
    }

    /// Process one raw `notify` payload.
    pub async fn handle_payload(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let delivery = match DeliveryMessage::decode(payload) {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(
                    topic,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping malformed delivery"
                );
                return DispatchOutcome::Malformed;
            }
        };

        self.dispatch(topic, &delivery).await
    }

    /// Send a decoded delivery.
    pub async fn dispatch(&self, topic: &str, delivery: &DeliveryMessage) -> DispatchOutcome {
        let recipient = delivery.recipient;

        if let Err(e) = self
            .gateway
            .send_text(recipient, &delivery.message, TextFormat::Plain)
            .await
        {
            tracing::error!(
                topic,
                recipient,
                message = %delivery.message,
                error = %e,
                "failed to send text message"
            );
            return DispatchOutcome::TextFailed;
        }

        let image = match delivery.image_bytes() {
            None => return DispatchOutcome::TextSent,
            Some(Ok(image)) => image,
            Some(Err(e)) => {
                tracing::error!(
                    topic,
                    recipient,
                    message = %delivery.message,
                    error = %e,
                    "failed to decode image"
                );
                return DispatchOutcome::ImageInvalid;
            }
        };

        if let Err(e) = self.gateway.send_photo(recipient, &image).await {
            tracing::error!(
                topic,
                recipient,
                message = %delivery.message,
                error = %e,
                "failed to send photo"
            );
            return DispatchOutcome::PhotoFailed;
        }

        DispatchOutcome::TextAndPhotoSent
    }
}

#[async_trait]
impl MessageHandler for DeliveryDispatcher {
    async fn handle(&self, message: BrokerMessage) {
        self.handle_payload(&message.topic, &message.payload).await;
    }
}
