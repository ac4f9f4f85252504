//! booking-check core - subscriber registry and notification fan-out.
//!
//! This crate receives scrape-result events from a topic broker, decides who
//! should be told, and republishes one delivery message per recipient. The
//! delivery side turns those messages into calls on a [`DeliveryGateway`].

pub mod broker;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod message;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use broker::{Broker, BrokerMessage, LocalBroker, MessageHandler, NatsBroker, Publisher};
pub use commands::{Command, Reply, SubscriptionCommands};
pub use dispatcher::{DeliveryDispatcher, DispatchOutcome};
pub use error::Error;
pub use fanout::{FanoutCoordinator, FanoutOutcome};
pub use gateway::{DeliveryGateway, TextFormat};
pub use message::{DeliveryMessage, ScrapeResultMessage, NOTIFY_TOPIC, SCRAPE_RESULT_TOPIC};
pub use registry::{
    run_blocking, RecipientId, Registry, SharedRegistry, SledRegistry, SubscriberSet,
};
