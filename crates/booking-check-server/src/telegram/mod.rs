//! Telegram Bot API integration.
//!
//! [`TelegramBot`] is the delivery gateway for notifications and command
//! replies. [`UpdateLoop`] long-polls for chat messages and hands commands
//! to the registry command handlers.

mod client;
pub mod types;
mod updates;

pub use client::TelegramBot;
pub use updates::{menu_commands, UpdateLoop, BOT_DESCRIPTION};
