//! Broker topics and their fixed JSON payload schemas.
//!
//! Both schemas ignore unknown fields. Missing required fields surface as
//! [`Error::Decode`]. The `image` field carries base64 text; an empty string
//! is treated the same as an absent image, which is what the scraper sends
//! when it could not take a screenshot.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::registry::RecipientId;

/// Topic the scraper publishes its results to.
pub const SCRAPE_RESULT_TOPIC: &str = "scrapper.result";

/// Topic carrying one self-contained delivery per recipient.
pub const NOTIFY_TOPIC: &str = "notify";

/// A scrape outcome published by the external scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResultMessage {
    /// Debug-only events go to the owner, and only while debug is enabled.
    pub debug: bool,
    /// Human-readable notification text.
    pub message: String,
    /// Base64-encoded screenshot.
    #[serde(
        default,
        deserialize_with = "non_empty_image",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<String>,
}

/// A notification addressed to exactly one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMessage {
    /// Destination chat.
    pub recipient: RecipientId,
    /// Text to send first.
    pub message: String,
    /// Base64-encoded photo to send after the text.
    #[serde(
        default,
        deserialize_with = "non_empty_image",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<String>,
}

impl ScrapeResultMessage {
    /// Decode a `scrapper.result` payload.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Encode as a `scrapper.result` payload.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Build the delivery for a single recipient from this event.
    pub fn delivery_for(&self, recipient: RecipientId) -> DeliveryMessage {
        DeliveryMessage {
            recipient,
            message: self.message.clone(),
            image: self.image.clone(),
        }
    }
}

impl DeliveryMessage {
    /// Decode a `notify` payload.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Encode as a `notify` payload.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode the attached image, if any.
    pub fn image_bytes(&self) -> Option<Result<Vec<u8>, Error>> {
        self.image.as_deref().map(|encoded| {
            STANDARD
                .decode(encoded)
                .map_err(|e| Error::Decode(format!("invalid base64 image: {}", e)))
        })
    }
}

fn non_empty_image<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let image = Option::<String>::deserialize(deserializer)?;
    Ok(image.filter(|s| !s.is_empty()))
}
