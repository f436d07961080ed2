use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::errors::Error;

use super::Conversation;

/// Active conversations keyed by sender.
///
/// Writes are guarded by the version the caller last read: `put` and
/// `delete` fail with [`Error::Conflict`] when the stored version differs
/// (0 meaning "nothing stored"). Entries past their time-to-live read as
/// absent.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, sender_id: &str) -> Result<Option<Conversation>, Error>;

    async fn put(&self, conversation: &Conversation, expected_version: u64) -> Result<(), Error>;

    async fn delete(&self, sender_id: &str, expected_version: u64) -> Result<(), Error>;

    /// Drops expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, Error> {
        Ok(0)
    }
}

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

pub(crate) fn expiry(ttl: Duration, from: DateTime<Utc>) -> DateTime<Utc> {
    from + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
}

#[derive(Clone, Debug)]
struct StoredConversation {
    conversation: Conversation,
    expires_at: DateTime<Utc>,
}

impl StoredConversation {
    fn live_version(&self, now: DateTime<Utc>) -> u64 {
        if self.expires_at <= now {
            0
        } else {
            self.conversation.version
        }
    }
}

/// Process-local store. Everything is lost on restart.
pub struct InMemoryConversationStore {
    entries: DashMap<String, StoredConversation>,
    ttl: Duration,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl InMemoryConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn conflict(sender_id: &str) -> Error {
        Error::Conflict {
            sender_id: sender_id.to_string(),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, sender_id: &str) -> Result<Option<Conversation>, Error> {
        let now = Utc::now();
        let found = self
            .entries
            .get(sender_id)
            .filter(|stored| stored.live_version(now) > 0)
            .map(|stored| stored.conversation.clone());
        Ok(found)
    }

    async fn put(&self, conversation: &Conversation, expected_version: u64) -> Result<(), Error> {
        let now = Utc::now();
        let stored = StoredConversation {
            conversation: conversation.clone(),
            expires_at: expiry(self.ttl, now),
        };

        match self.entries.entry(conversation.sender_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().live_version(now) != expected_version {
                    return Err(Self::conflict(&conversation.sender_id));
                }
                occupied.insert(stored);
            }
            Entry::Vacant(vacant) => {
                if expected_version != 0 {
                    return Err(Self::conflict(&conversation.sender_id));
                }
                vacant.insert(stored);
            }
        }
        Ok(())
    }

    async fn delete(&self, sender_id: &str, expected_version: u64) -> Result<(), Error> {
        let now = Utc::now();
        match self.entries.entry(sender_id.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().live_version(now) != expected_version {
                    return Err(Self::conflict(sender_id));
                }
                occupied.remove();
                Ok(())
            }
            Entry::Vacant(_) if expected_version == 0 => Ok(()),
            Entry::Vacant(_) => Err(Self::conflict(sender_id)),
        }
    }

    async fn purge_expired(&self) -> Result<usize, Error> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
