//! Chat commands that read or mutate the registry.
//!
//! Admin commands (`/enabledebug`, `/disabledebug`, `/status`) are answered
//! only for the owner. Anyone else gets no reply at all, so the commands stay
//! invisible.

use std::sync::Arc;

use crate::gateway::{DeliveryGateway, TextFormat};
use crate::registry::{RecipientId, SharedRegistry};

const WELCOME_TEXT: &str = "Welcome!

Use /subscribe command to subscribe to the hour availability notification.
Use /unsubscribe command to stop receiving notifications.
";

/// A recognised chat command. Matching is exact on the whole message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `/start`
    Start,
    /// `/subscribe`
    Subscribe,
    /// `/unsubscribe`
    Unsubscribe,
    /// `/enabledebug` (owner only)
    EnableDebug,
    /// `/disabledebug` (owner only)
    DisableDebug,
    /// `/status` (owner only)
    Status,
    /// `/me`
    Me,
}

impl Command {
    /// Every command, in menu order.
    pub const ALL: [Command; 7] = [
        Command::Subscribe,
        Command::Unsubscribe,
        Command::Me,
        Command::Start,
        Command::EnableDebug,
        Command::DisableDebug,
        Command::Status,
    ];

    /// The command text, including the leading slash.
    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Subscribe => "/subscribe",
            Command::Unsubscribe => "/unsubscribe",
            Command::EnableDebug => "/enabledebug",
            Command::DisableDebug => "/disabledebug",
            Command::Status => "/status",
            Command::Me => "/me",
        }
    }

    /// Parse a message text.
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == text)
    }

    /// Menu description. Commands without one are not advertised.
    pub fn description(self) -> Option<&'static str> {
        match self {
            Command::Subscribe => Some("Subscribe to Spain Consulate Hour check"),
            Command::Unsubscribe => Some("Unsubscribe from Spain Consulate Hour check"),
            Command::Me => Some("Returns your user's Telegram ID"),
            Command::Start | Command::EnableDebug | Command::DisableDebug | Command::Status => None,
        }
    }

    /// Whether only the owner may run this command.
    pub fn is_privileged(self) -> bool {
        matches!(
            self,
            Command::EnableDebug | Command::DisableDebug | Command::Status
        )
    }
}

/// Text sent back to the command's sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message body.
    pub text: String,
    /// Rendering mode.
    pub format: TextFormat,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
        }
    }
}

/// Executes commands against the registry and answers through the gateway.
#[derive(Clone)]
pub struct SubscriptionCommands {
    registry: SharedRegistry,
    gateway: Arc<dyn DeliveryGateway>,
    owner: RecipientId,
}

impl SubscriptionCommands {
    /// Create a new command handler.
    pub fn new(
        registry: SharedRegistry,
        gateway: Arc<dyn DeliveryGateway>,
        owner: RecipientId,
    ) -> Self {
        Self {
            registry,
            gateway,
            owner,
        }
    }

    /// Parse and run a message text. Returns `false` if it is not a command.
    pub async fn handle_text(&self, sender: RecipientId, text: &str) -> bool {
        match Command::parse(text) {
            Some(command) => {
                self.handle(sender, command).await;
                true
            }
            None => false,
        }
    }

    /// Run a command and send the reply, if any.
    ///
    /// Registry access happens on the blocking thread pool.
    pub async fn handle(&self, sender: RecipientId, command: Command) {
        let commands = self.clone();
        let executed = tokio::task::spawn_blocking(move || commands.execute(sender, command)).await;
        let reply = match executed {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    chat_id = sender,
                    command = command.name(),
                    error = %e,
                    "command task failed"
                );
                return;
            }
        };

        let Some(reply) = reply else {
            tracing::debug!(sender, command = command.name(), "ignoring privileged command");
            return;
        };

        if let Err(e) = self
            .gateway
            .send_text(sender, &reply.text, reply.format)
            .await
        {
            tracing::error!(
                chat_id = sender,
                command = command.name(),
                error = %e,
                "failed to send command reply"
            );
        }
    }

    /// Run a command and build its reply without sending it.
    ///
    /// Returns `None` when a non-owner invokes an admin command.
    pub fn execute(&self, sender: RecipientId, command: Command) -> Option<Reply> {
        if command.is_privileged() && sender != self.owner {
            return None;
        }

        let reply = match command {
            Command::Start => Reply::plain(WELCOME_TEXT),
            Command::Subscribe => self.subscribe(sender),
            Command::Unsubscribe => self.unsubscribe(sender),
            Command::EnableDebug => self.set_debug(sender, true),
            Command::DisableDebug => self.set_debug(sender, false),
            Command::Status => self.status(sender),
            Command::Me => Reply {
                text: format!("Your Telegram user ID is: `{}`", sender),
                format: TextFormat::Markdown,
            },
        };

        Some(reply)
    }

    fn subscribe(&self, sender: RecipientId) -> Reply {
        match self.registry.add_subscriber(sender) {
            Ok(true) => Reply::plain("User subscribed"),
            Ok(false) => Reply::plain("User already subscribed"),
            Err(e) => {
                tracing::error!(chat_id = sender, error = %e, "failed to add subscriber");
                Reply::plain("Error subscribing to the notifications")
            }
        }
    }

    fn unsubscribe(&self, sender: RecipientId) -> Reply {
        match self.registry.remove_subscriber(sender) {
            Ok(()) => Reply::plain("User unsubscribed"),
            Err(e) => {
                tracing::error!(chat_id = sender, error = %e, "failed to remove subscriber");
                Reply::plain("Error unsubscribing from the notifications")
            }
        }
    }

    fn set_debug(&self, sender: RecipientId, enabled: bool) -> Reply {
        let action = if enabled { "enabling" } else { "disabling" };
        match self.registry.set_debug(enabled) {
            Ok(()) if enabled => Reply::plain("Debug enabled"),
            Ok(()) => Reply::plain("Debug disabled"),
            Err(e) => {
                tracing::error!(chat_id = sender, enabled, error = %e, "failed to store debug status");
                Reply::plain(format!("Error {} debug", action))
            }
        }
    }

    fn status(&self, sender: RecipientId) -> Reply {
        let debug = self.registry.debug_enabled();
        let subs = self.registry.subscribers();

        match (debug, subs) {
            (Ok(debug), Ok(subs)) => Reply::plain(format!(
                "System status:\n\nDebug status: {}\nSubscriptions: [{}]\n",
                debug,
                join_ids(&subs)
            )),
            (debug, subs) => {
                let mut text = String::from("Error getting system status:\n");
                if let Err(e) = debug {
                    tracing::error!(chat_id = sender, error = %e, "failed to read debug status");
                    text.push_str(&format!("- debug status: {}\n", e));
                }
                if let Err(e) = subs {
                    tracing::error!(chat_id = sender, error = %e, "failed to read subscribers");
                    text.push_str(&format!("- subscribers: {}\n", e));
                }
                Reply::plain(text)
            }
        }
    }
}

/// Space-separated ids, as in `[1 2 3]`.
fn join_ids(ids: &[RecipientId]) -> String {
    ids.iter()
        .map(RecipientId::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
