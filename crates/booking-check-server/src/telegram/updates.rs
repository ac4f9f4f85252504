//! Long-poll loop feeding chat commands to the command handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use booking_check_core::{Command, SubscriptionCommands};

use super::client::TelegramBot;
use super::types::BotCommand;
use crate::error::Error;

/// Pause after a failed `getUpdates` before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Text shown in the bot's profile.
pub const BOT_DESCRIPTION: &str = "This bot will try to help you getting a Montevideo's Spain \
Consulate booking hour by notifying you when the booking system shows hour availability.

Privacy: at the moment you /subscribe to these notifications, I will only save your Telegram user ID.

Disclaimer: this bot was not created by the Spain Consulate and is not an official communication \
channel of them; this is just a simple bot that will send you a message when it detects hour \
availability in the booking system.";

/// Menu entries for every command that has a description.
pub fn menu_commands() -> Vec<BotCommand> {
    Command::ALL
        .into_iter()
        .filter_map(|command| {
            command.description().map(|description| BotCommand {
                command: command.name().trim_start_matches('/').to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

/// Receives chat messages and runs the matching command.
pub struct UpdateLoop {
    bot: Arc<TelegramBot>,
    commands: Arc<SubscriptionCommands>,
}

impl UpdateLoop {
    /// Create a new update loop.
    pub fn new(bot: Arc<TelegramBot>, commands: Arc<SubscriptionCommands>) -> Self {
        Self { bot, commands }
    }

    /// Publish the bot profile and command menu.
    pub async fn configure(&self, description: &str) -> Result<(), Error> {
        self.bot.set_my_description(description).await?;
        self.bot.set_my_commands(&menu_commands()).await?;
        Ok(())
    }

    /// Poll until a shutdown signal arrives.
    ///
    /// Each command runs on its own task. Commands still running at shutdown
    /// are not awaited.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), Error> {
        tracing::info!("listening for bot updates");
        let mut offset = 0;

        loop {
            let polled = tokio::select! {
                _ = shutdown.recv() => break,
                polled = self.bot.get_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch bot updates");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some((chat_id, text)) = update.text_message() else {
                    continue;
                };
                let Some(command) = Command::parse(text) else {
                    continue;
                };

                tracing::debug!(chat_id, command = command.name(), "received command");
                let commands = self.commands.clone();
                tokio::spawn(async move { commands.handle(chat_id, command).await });
            }
        }

        tracing::info!("bot update loop stopped");
        Ok(())
    }
}
