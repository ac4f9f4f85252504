//! Serialized form of the subscriber set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::RecipientId;
use crate::error::Error;

/// Empty marker value; serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Member {}

/// A set of recipients stored as a JSON object whose keys are the ids.
///
/// `{"123": {}, "-456": {}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberSet {
    members: BTreeMap<RecipientId, Member>,
}

impl SubscriberSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipient. Returns `false` if it was already a member.
    pub fn insert(&mut self, id: RecipientId) -> bool {
        self.members.insert(id, Member {}).is_none()
    }

    /// Remove a recipient. Returns `true` if it was a member.
    pub fn remove(&mut self, id: RecipientId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Membership test.
    pub fn contains(&self, id: RecipientId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members.
    pub fn ids(&self) -> Vec<RecipientId> {
        self.members.keys().copied().collect()
    }

    /// Decode a stored blob. A JSON `null` decodes to the empty set.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let members: Option<BTreeMap<RecipientId, Member>> = serde_json::from_slice(bytes)
            .map_err(|e| Error::Serialization(format!("subscriber set: {}", e)))?;
        Ok(Self {
            members: members.unwrap_or_default(),
        })
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(format!("subscriber set: {}", e)))
    }
}

impl FromIterator<RecipientId> for SubscriberSet {
    fn from_iter<I: IntoIterator<Item = RecipientId>>(iter: I) -> Self {
        let mut set = SubscriberSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}
