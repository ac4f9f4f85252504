//! Broker backed by a NATS server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use super::{report_handler_result, Broker, BrokerMessage, MessageHandler, Publisher};
use crate::error::Error;

/// Client name reported to the server.
const CLIENT_NAME: &str = "booking-check";

/// Broker that maps topics one to one onto NATS subjects.
///
/// Producers outside this process (the scraper) publish on the same subjects.
/// Each subscription spawns one task per message, as [`LocalBroker`] does.
///
/// [`LocalBroker`]: super::LocalBroker
pub struct NatsBroker {
    client: async_nats::Client,
    /// Flipped once on shutdown; every subscription worker watches it.
    stop: watch::Sender<bool>,
    /// Subscription workers. Held across `subscribe` so shutdown never
    /// misses one.
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl NatsBroker {
    /// Connect to the server at `url`, e.g. `nats://127.0.0.1:4222`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = async_nats::ConnectOptions::new()
            .name(CLIENT_NAME)
            .connect(url)
            .await
            .map_err(|e| Error::Broker(format!("failed to connect to {}: {}", url, e)))?;
        tracing::info!(url, "connected to nats");

        let (stop, _) = watch::channel(false);
        Ok(Self {
            client,
            stop,
            workers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Whether [`Broker::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for NatsBroker {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Broker("broker is shut down".to_string()));
        }

        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| Error::Broker(format!("failed to publish to '{}': {}", topic, e)))
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error> {
        let mut workers = self.workers.lock().await;
        if self.is_closed() {
            return Err(Error::Broker(format!(
                "failed to subscribe to topic '{}': broker is shut down",
                topic
            )));
        }

        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| Error::Broker(format!("failed to subscribe to '{}': {}", topic, e)))?;

        workers.push(tokio::spawn(run_subscription(
            topic.to_string(),
            subscriber,
            handler,
            self.stop.subscribe(),
        )));

        tracing::debug!(topic, "subscription created");
        Ok(())
    }

    /// Unsubscribe, wait for in-flight handlers, then flush pending
    /// publishes to the server.
    async fn shutdown(&self) {
        let workers = {
            let mut workers = self.workers.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            self.stop.send_replace(true);
            std::mem::take(&mut *workers)
        };

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "subscription worker panicked");
            }
        }

        if let Err(e) = self.client.flush().await {
            tracing::warn!(error = %e, "failed to flush nats connection");
        }

        tracing::info!("broker shut down");
    }
}

async fn run_subscription(
    topic: String,
    mut subscriber: async_nats::Subscriber,
    handler: Arc<dyn MessageHandler>,
    mut stop: watch::Receiver<bool>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            message = subscriber.next() => match message {
                Some(message) => {
                    let message = BrokerMessage::new(message.subject.to_string(), message.payload);
                    let handler = handler.clone();
                    in_flight.spawn(async move { handler.handle(message).await });
                }
                None => break,
            },
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                report_handler_result(&topic, result);
            }
        }
    }

    if let Err(e) = subscriber.unsubscribe().await {
        tracing::warn!(topic = %topic, error = %e, "failed to unsubscribe");
    }

    while let Some(result) = in_flight.join_next().await {
        report_handler_result(&topic, result);
    }

    tracing::debug!(topic = %topic, "subscription closed");
}
