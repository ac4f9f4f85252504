//! Registry backed by a sled database.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionResult};
use sled::Db;

use super::{RecipientId, Registry, SubscriberSet};
use crate::error::Error;

/// Key holding the JSON boolean debug flag.
const DEBUG_STATUS_KEY: &[u8] = b"debug_status";

/// Key holding the JSON-encoded subscriber set.
const SUBSCRIPTIONS_KEY: &[u8] = b"subscriptions_prod";

/// Durable registry. Read-modify-write operations run inside sled
/// transactions, which retry on conflict, so concurrent writers never lose
/// each other's updates.
pub struct SledRegistry {
    db: Db,
}

impl SledRegistry {
    /// Open or create a registry at the given directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a registry that lives only as long as this handle.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }
}

impl Registry for SledRegistry {
    fn add_subscriber(&self, id: RecipientId) -> Result<bool, Error> {
        let result: TransactionResult<bool, Error> = self.db.transaction(|tx| {
            let mut subs = match tx.get(SUBSCRIPTIONS_KEY)? {
                Some(raw) => SubscriberSet::decode(&raw).map_err(ConflictableTransactionError::Abort)?,
                None => SubscriberSet::new(),
            };

            if !subs.insert(id) {
                return Ok(false);
            }

            let encoded = subs.encode().map_err(ConflictableTransactionError::Abort)?;
            tx.insert(SUBSCRIPTIONS_KEY, encoded)?;
            Ok(true)
        });

        let added = result?;
        tracing::debug!(recipient = id, added, "subscriber added");
        Ok(added)
    }

    fn remove_subscriber(&self, id: RecipientId) -> Result<(), Error> {
        let result: TransactionResult<(), Error> = self.db.transaction(|tx| {
            let Some(raw) = tx.get(SUBSCRIPTIONS_KEY)? else {
                return Ok(());
            };

            let mut subs = SubscriberSet::decode(&raw).map_err(ConflictableTransactionError::Abort)?;
            if !subs.remove(id) {
                return Ok(());
            }

            let encoded = subs.encode().map_err(ConflictableTransactionError::Abort)?;
            tx.insert(SUBSCRIPTIONS_KEY, encoded)?;
            Ok(())
        });

        result?;
        tracing::debug!(recipient = id, "subscriber removed");
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<RecipientId>, Error> {
        match self.db.get(SUBSCRIPTIONS_KEY)? {
            Some(raw) => Ok(SubscriberSet::decode(&raw)?.ids()),
            None => Ok(Vec::new()),
        }
    }

    fn set_debug(&self, enabled: bool) -> Result<(), Error> {
        let encoded =
            serde_json::to_vec(&enabled).map_err(|e| Error::Serialization(e.to_string()))?;
        self.db.insert(DEBUG_STATUS_KEY, encoded)?;
        tracing::debug!(enabled, "debug status stored");
        Ok(())
    }

    fn debug_enabled(&self) -> Result<bool, Error> {
        match self.db.get(DEBUG_STATUS_KEY)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| Error::Serialization(format!("debug status: {}", e))),
            None => Ok(false),
        }
    }
}
