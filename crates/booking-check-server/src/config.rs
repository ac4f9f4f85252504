//! Server configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use booking_check_core::broker::DEFAULT_QUEUE_CAPACITY;
use booking_check_core::RecipientId;
use clap::Parser;

use crate::error::Error;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Default Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Default long-poll timeout for `getUpdates`, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Directory holding the registry database.
    pub db_path: PathBuf,

    /// Telegram bot token.
    pub telegram_token: String,

    /// Chat that receives debug events and may run admin commands.
    pub owner_id: RecipientId,

    /// HTTP address to bind to.
    pub listen_addr: String,

    /// Telegram Bot API base URL.
    pub telegram_api_url: String,

    /// Long-poll timeout for fetching bot updates.
    pub poll_timeout: Duration,

    /// Messages buffered per broker subscription.
    pub queue_capacity: usize,

    /// NATS server to use as the broker. `None` keeps the broker in process,
    /// fed only by the HTTP ingress.
    pub nats_url: Option<String>,
}

impl ServerConfig {
    /// Create a configuration with defaults for everything but the required values.
    pub fn new(
        db_path: impl Into<PathBuf>,
        telegram_token: impl Into<String>,
        owner_id: RecipientId,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            telegram_token: telegram_token.into(),
            owner_id,
            listen_addr: DEFAULT_LISTEN_ADDRESS.to_string(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            nats_url: None,
        }
    }

    /// Set the HTTP listen address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the Telegram Bot API base URL.
    pub fn with_telegram_api_url(mut self, url: impl Into<String>) -> Self {
        self.telegram_api_url = url.into();
        self
    }

    /// Set the long-poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the per-subscription queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Use a NATS server as the broker.
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Reject values that would only fail later, at first use.
    pub fn validate(&self) -> Result<(), Error> {
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::Config("database path is empty".to_string()));
        }
        if self.telegram_token.trim().is_empty() {
            return Err(Error::Config("telegram bot token is empty".to_string()));
        }
        if self.telegram_token.chars().any(char::is_whitespace) {
            return Err(Error::Config(
                "telegram bot token contains whitespace".to_string(),
            ));
        }
        if self.listen_addr.is_empty() {
            return Err(Error::Config("listen address is empty".to_string()));
        }
        if self.nats_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(Error::Config("nats url is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("db_path", &self.db_path)
            .field("telegram_token", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field("listen_addr", &self.listen_addr)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("poll_timeout", &self.poll_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("nats_url", &self.nats_url)
            .finish()
    }
}

/// Command-line arguments for the server. Required values may also come
/// from the environment.
#[derive(Parser, Debug)]
#[command(name = "booking-check-server")]
#[command(version, about = "Booking availability notifier", long_about = None)]
pub struct Args {
    /// Path to the registry database directory.
    #[arg(long, env = "DB_PATH")]
    pub db_path: PathBuf,

    /// Telegram bot token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    /// Telegram ID of the bot owner.
    #[arg(long, env = "TELEGRAM_BOT_OWNER_ID", allow_hyphen_values = true)]
    pub telegram_bot_owner_id: RecipientId,

    /// HTTP address to listen on.
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Telegram Bot API base URL.
    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API_URL)]
    pub telegram_api_url: String,

    /// Long-poll timeout for bot updates, in seconds.
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
    pub poll_timeout: u64,

    /// Messages buffered per broker subscription.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// NATS server to use as the broker, e.g. `nats://127.0.0.1:4222`.
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,
}

impl Args {
    /// Convert command-line arguments to a validated server configuration.
    pub fn into_config(self) -> Result<ServerConfig, Error> {
        let config = ServerConfig::new(
            self.db_path,
            self.telegram_bot_token,
            self.telegram_bot_owner_id,
        )
        .with_listen_addr(self.listen)
        .with_telegram_api_url(self.telegram_api_url)
        .with_poll_timeout(Duration::from_secs(self.poll_timeout))
        .with_queue_capacity(self.queue_capacity);
        let config = match self.nats_url {
            Some(url) => config.with_nats_url(url),
            None => config,
        };

        config.validate()?;
        Ok(config)
    }
}
