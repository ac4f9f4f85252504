//! Outbound delivery capability.

use async_trait::async_trait;

use crate::error::Error;
use crate::registry::RecipientId;

/// How the chat platform should render a text message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// Sent verbatim.
    #[default]
    Plain,
    /// Rendered as Markdown.
    Markdown,
}

/// Sends messages to a recipient on the chat platform.
///
/// Implementations report every failure as [`Error::Delivery`]; callers log
/// it and move on. There is no retry at this layer.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Send a text message.
    async fn send_text(
        &self,
        recipient: RecipientId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), Error>;

    /// Send a photo.
    async fn send_photo(&self, recipient: RecipientId, image: &[u8]) -> Result<(), Error>;
}
