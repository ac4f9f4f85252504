//! Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use booking_check_core::{DeliveryGateway, RecipientId, TextFormat};

use super::types::{
    ApiResponse, BotCommand, BotUser, CommandScope, GetUpdatesRequest, SendMessageRequest,
    SetMyCommandsRequest, SetMyDescriptionRequest, Update,
};
use crate::config::ServerConfig;
use crate::error::Error;

/// Filename attached to uploaded screenshots.
const PHOTO_FILENAME: &str = "scrapper-screenshot";

/// Extra time granted to a request on top of the long-poll timeout.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Thin client over the Telegram Bot API.
///
/// Transport errors are stripped of their URL before they are returned,
/// since the URL embeds the bot token.
pub struct TelegramBot {
    client: Client,
    /// `{api_url}/bot{token}`
    endpoint: String,
    poll_timeout: Duration,
}

impl TelegramBot {
    /// Build a client without contacting the API.
    pub fn new(config: &ServerConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.poll_timeout + REQUEST_TIMEOUT_MARGIN)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::Telegram(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}",
                config.telegram_api_url.trim_end_matches('/'),
                config.telegram_token
            ),
            poll_timeout: config.poll_timeout,
        })
    }

    /// Build a client and check the token with `getMe`.
    pub async fn connect(config: &ServerConfig) -> Result<Self, Error> {
        let bot = Self::new(config)?;
        let me = bot.get_me().await?;
        tracing::info!(bot_id = me.id, username = ?me.username, "connected to telegram");
        Ok(bot)
    }

    /// Fetch the bot's own account.
    pub async fn get_me(&self) -> Result<BotUser, Error> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Set the text shown in the bot's profile.
    pub async fn set_my_description(&self, description: &str) -> Result<(), Error> {
        let _: IgnoredAny = self
            .call("setMyDescription", &SetMyDescriptionRequest { description })
            .await?;
        Ok(())
    }

    /// Replace the command menu.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), Error> {
        let request = SetMyCommandsRequest {
            commands,
            scope: CommandScope::Default,
        };
        let applied: bool = self.call("setMyCommands", &request).await?;
        if !applied {
            return Err(Error::Telegram("telegram bot commands not set".to_string()));
        }
        Ok(())
    }

    /// Long-poll for updates at or after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, Error> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &request).await
    }

    /// Send a text message.
    pub async fn send_message(
        &self,
        chat_id: RecipientId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), Error> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: match format {
                TextFormat::Plain => None,
                TextFormat::Markdown => Some("Markdown"),
            },
        };
        let _: IgnoredAny = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Upload and send a photo.
    pub async fn send_photo(&self, chat_id: RecipientId, image: &[u8]) -> Result<(), Error> {
        let photo = Part::bytes(image.to_vec()).file_name(PHOTO_FILENAME);
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("sendPhoto", e))?;

        let _: IgnoredAny = read_response("sendPhoto", response).await?;
        Ok(())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;

        read_response(method, response).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }
}

async fn read_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, Error> {
    let status = response.status();
    let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
        Error::Telegram(format!(
            "{} returned an unreadable response ({}): {}",
            method,
            status,
            e.without_url()
        ))
    })?;

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            description,
            error_code,
            ..
        } => Err(Error::Telegram(format!(
            "{} failed ({}): {}",
            method,
            error_code.map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
            description.unwrap_or_else(|| "no description".to_string())
        ))),
    }
}

fn transport_error(method: &str, err: reqwest::Error) -> Error {
    Error::Telegram(format!("{} request failed: {}", method, err.without_url()))
}

#[async_trait]
impl DeliveryGateway for TelegramBot {
    async fn send_text(
        &self,
        recipient: RecipientId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), booking_check_core::Error> {
        self.send_message(recipient, text, format)
            .await
            .map_err(|e| booking_check_core::Error::Delivery(e.to_string()))
    }

    async fn send_photo(
        &self,
        recipient: RecipientId,
        image: &[u8],
    ) -> Result<(), booking_check_core::Error> {
        TelegramBot::send_photo(self, recipient, image)
            .await
            .map_err(|e| booking_check_core::Error::Delivery(e.to_string()))
    }
}
