//! In-memory doubles for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::broker::{BrokerMessage, MessageHandler, Publisher};
use crate::error::Error;
use crate::gateway::{DeliveryGateway, TextFormat};
use crate::message::DeliveryMessage;
use crate::registry::{RecipientId, Registry, SubscriberSet};

#[derive(Default)]
pub struct RecordingHandler {
    messages: Mutex<Vec<BrokerMessage>>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub fn messages(&self) -> Vec<BrokerMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: BrokerMessage) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.messages.lock().push(message);
    }
}

/// Records published deliveries; refuses those addressed to `failing`.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Bytes)>>,
    failing: HashSet<RecipientId>,
}

impl RecordingPublisher {
    pub fn failing_for(failing: impl IntoIterator<Item = RecipientId>) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failing: failing.into_iter().collect(),
        }
    }

    pub fn deliveries(&self) -> Vec<DeliveryMessage> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload)| DeliveryMessage::decode(payload).unwrap())
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        if let Ok(delivery) = DeliveryMessage::decode(&payload) {
            if self.failing.contains(&delivery.recipient) {
                return Err(Error::Broker("connection reset".to_string()));
            }
        }
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }
}

/// Registry kept in memory with switchable failures.
#[derive(Default)]
pub struct MemoryRegistry {
    subs: Mutex<SubscriberSet>,
    debug: Mutex<bool>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    blocking_io: bool,
}

impl MemoryRegistry {
    pub fn with_subscribers(ids: impl IntoIterator<Item = RecipientId>) -> Self {
        Self {
            subs: Mutex::new(ids.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Every operation blocks the calling thread on the runtime, which panics
    /// when called from an async task instead of the blocking pool.
    pub fn blocking(mut self) -> Self {
        self.blocking_io = true;
        self
    }

    pub fn failing() -> Self {
        let registry = Self::default();
        registry.fail_reads.store(true, Ordering::SeqCst);
        registry.fail_writes.store(true, Ordering::SeqCst);
        registry
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), Error> {
        if self.blocking_io {
            tokio::runtime::Handle::current()
                .block_on(tokio::time::sleep(Duration::from_millis(1)));
        }
        if flag.load(Ordering::SeqCst) {
            return Err(Error::Serialization("unexpected end of input".to_string()));
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    fn add_subscriber(&self, id: RecipientId) -> Result<bool, Error> {
        self.check(&self.fail_writes)?;
        Ok(self.subs.lock().insert(id))
    }

    fn remove_subscriber(&self, id: RecipientId) -> Result<(), Error> {
        self.check(&self.fail_writes)?;
        self.subs.lock().remove(id);
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<RecipientId>, Error> {
        self.check(&self.fail_reads)?;
        Ok(self.subs.lock().ids())
    }

    fn set_debug(&self, enabled: bool) -> Result<(), Error> {
        self.check(&self.fail_writes)?;
        *self.debug.lock() = enabled;
        Ok(())
    }

    fn debug_enabled(&self) -> Result<bool, Error> {
        self.check(&self.fail_reads)?;
        Ok(*self.debug.lock())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(RecipientId, String, TextFormat),
    Photo(RecipientId, Vec<u8>),
}

/// Records sends; text and photo sends can fail per recipient.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<Sent>>,
    pub failing_text: HashSet<RecipientId>,
    pub failing_photo: HashSet<RecipientId>,
}

impl RecordingGateway {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts_to(&self, recipient: RecipientId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text(r, text, _) if *r == recipient => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send_text(
        &self,
        recipient: RecipientId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), Error> {
        if self.failing_text.contains(&recipient) {
            return Err(Error::Delivery("Forbidden: bot was blocked by the user".to_string()));
        }
        self.sent
            .lock()
            .push(Sent::Text(recipient, text.to_string(), format));
        Ok(())
    }

    async fn send_photo(&self, recipient: RecipientId, image: &[u8]) -> Result<(), Error> {
        if self.failing_photo.contains(&recipient) {
            return Err(Error::Delivery("Bad Request: IMAGE_PROCESS_FAILED".to_string()));
        }
        self.sent.lock().push(Sent::Photo(recipient, image.to_vec()));
        Ok(())
    }
}
