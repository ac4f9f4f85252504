//! In-process broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinHandle, JoinSet};

use super::{report_handler_result, Broker, BrokerMessage, MessageHandler, Publisher};
use crate::error::Error;

/// Default number of messages buffered per subscription.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Broker that carries messages between tasks of the same process.
///
/// Each subscription owns a bounded queue and a worker that spawns one task
/// per message, so handlers for the same topic run concurrently. Publishing to
/// a topic nobody listens on succeeds and the message is discarded.
pub struct LocalBroker {
    /// Subscription queues keyed by topic.
    topics: RwLock<HashMap<String, Vec<mpsc::Sender<BrokerMessage>>>>,
    /// Subscription workers, joined on shutdown.
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    capacity: usize,
}

impl LocalBroker {
    /// Create a broker with the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broker buffering up to `capacity` messages per subscription.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            workers: parking_lot::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Number of subscriptions on a topic.
    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, Vec::len)
    }

    /// Whether [`Broker::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for LocalBroker {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        let senders = {
            let topics = self.topics.read().await;
            if self.is_closed() {
                return Err(Error::Broker("broker is shut down".to_string()));
            }
            match topics.get(topic) {
                Some(senders) => senders.clone(),
                None => {
                    tracing::trace!(topic, "no subscribers for topic");
                    return Ok(());
                }
            }
        };

        let message = BrokerMessage::new(topic, payload);
        for sender in senders {
            sender
                .send(message.clone())
                .await
                .map_err(|_| Error::Broker(format!("subscription on '{}' is closed", topic)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error> {
        // `closed` only flips under the write lock, so a subscription is
        // either refused here or fully registered before shutdown collects
        // the workers.
        let mut topics = self.topics.write().await;
        if self.is_closed() {
            return Err(Error::Broker(format!(
                "failed to subscribe to topic '{}': broker is shut down",
                topic
            )));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        topics.entry(topic.to_string()).or_default().push(tx);

        let worker = tokio::spawn(run_subscription(topic.to_string(), rx, handler));
        self.workers.lock().push(worker);
        drop(topics);

        tracing::debug!(topic, "subscription created");
        Ok(())
    }

    /// Stop accepting messages and wait for in-flight handlers.
    ///
    /// Messages already queued are still handled. Handlers that publish while
    /// the broker is shutting down get an [`Error::Broker`].
    async fn shutdown(&self) {
        {
            let mut topics = self.topics.write().await;
            self.closed.store(true, Ordering::SeqCst);
            topics.clear();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "subscription worker panicked");
            }
        }

        tracing::info!("broker shut down");
    }
}

async fn run_subscription(
    topic: String,
    mut rx: mpsc::Receiver<BrokerMessage>,
    handler: Arc<dyn MessageHandler>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => {
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

    while let Some(result) = in_flight.join_next().await {
        report_handler_result(&topic, result);
    }

    tracing::debug!(topic = %topic, "subscription closed");
}
