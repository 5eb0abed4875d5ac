//! Conversation threads and their storage.
//!
//! A thread is the ordered, append-only history of one conversation between
//! an administrator and an assistant. New threads start from the store's
//! seed message; nothing is written until the first append.

use crate::error::ThreadStoreError;
use crate::message::Message;
use async_trait::async_trait;
use brigade_core::{AdminId, RestaurantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, instrument};

/// Opaque identifier of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Creates a thread id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the thread of an administrator with one assistant kind,
    /// e.g. `staff-1`.
    #[must_use]
    pub fn for_admin(kind: &str, admin_id: &AdminId) -> Self {
        Self(format!("{kind}-{admin_id}"))
    }

    /// Prefixes the id with its restaurant, e.g. `r1/staff-1`.
    #[must_use]
    pub fn in_restaurant(self, restaurant_id: &RestaurantId) -> Self {
        Self(format!("{restaurant_id}/{}", self.0))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A stored thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier.
    pub id: ThreadId,
    /// History in causal order, starting with the seed.
    pub messages: Vec<Message>,
    /// When the thread was first written.
    pub created_at: DateTime<Utc>,
    /// When the thread was last appended to.
    pub last_active_at: DateTime<Utc>,
}

impl Thread {
    /// Creates a thread holding only the seed message.
    #[must_use]
    pub fn seeded(id: ThreadId, seed: Message) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: vec![seed],
            created_at: now,
            last_active_at: now,
        }
    }

    /// Appends messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.last_active_at = Utc::now();
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the last message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Durable conversation memory keyed by thread id.
///
/// Implementations must make `append` atomic and serialize concurrent appends
/// to the same thread. A `load` after an `append` observes the appended
/// messages.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Returns the history, or just the seed message for a new thread.
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ThreadStoreError>;

    /// Extends the history. The first append to a thread stores the seed
    /// ahead of the given messages.
    async fn append(
        &self,
        thread_id: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), ThreadStoreError>;

    /// Clears the history back to the seed message.
    async fn reset(&self, thread_id: &ThreadId) -> Result<(), ThreadStoreError>;

    /// Returns the stored thread, or `None` if nothing was ever appended.
    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<Thread>, ThreadStoreError>;
}

/// Process-local thread store.
#[derive(Debug, Clone)]
pub struct InMemoryThreadStore {
    seed: Message,
    threads: Arc<Mutex<HashMap<ThreadId, Thread>>>,
}

impl InMemoryThreadStore {
    /// Creates an empty store whose threads start from `seed`.
    #[must_use]
    pub fn new(seed: Message) -> Self {
        Self {
            seed,
            threads: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the seed message.
    #[must_use]
    pub fn seed(&self) -> &Message {
        &self.seed
    }

    /// Returns the number of threads that hold history.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, Thread>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ThreadStoreError> {
        Ok(self
            .lock()
            .get(thread_id)
            .map_or_else(|| vec![self.seed.clone()], |thread| thread.messages.clone()))
    }

    #[instrument(skip_all, fields(thread_id = %thread_id, count = messages.len()))]
    async fn append(
        &self,
        thread_id: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), ThreadStoreError> {
        self.lock()
            .entry(thread_id.clone())
            .or_insert_with(|| Thread::seeded(thread_id.clone(), self.seed.clone()))
            .extend(messages);
        debug!("appended to thread");
        Ok(())
    }

    async fn reset(&self, thread_id: &ThreadId) -> Result<(), ThreadStoreError> {
        self.lock().remove(thread_id);
        Ok(())
    }

    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<Thread>, ThreadStoreError> {
        Ok(self.lock().get(thread_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;

    fn store() -> InMemoryThreadStore {
        InMemoryThreadStore::new(Message::system("You manage staff."))
    }

    #[test]
    fn thread_ids_for_admins() {
        let admin: AdminId = "1".parse().unwrap();
        let restaurant: RestaurantId = "r1".parse().unwrap();

        let id = ThreadId::for_admin("staff", &admin);
        assert_eq!(id.as_str(), "staff-1");
        assert_eq!(id.in_restaurant(&restaurant).to_string(), "r1/staff-1");
    }

    #[tokio::test]
    async fn new_thread_loads_seed_without_writing() {
        let store = store();
        let history = store.load(&"staff-1".into()).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::System);
        assert_eq!(store.thread_count(), 0);
        assert!(store.snapshot(&"staff-1".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_is_read_back() {
        let store = store();
        let id = ThreadId::from("staff-1");
        let user = Message::user("hello");
        let reply = Message::assistant("hi");

        store.append(&id, vec![user.clone(), reply.clone()]).await.unwrap();
        let history = store.load(&id).await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0], *store.seed());
        assert_eq!(history[1], user);
        assert_eq!(history[2], reply);
    }

    #[tokio::test]
    async fn history_only_grows() {
        let store = store();
        let id = ThreadId::from("staff-1");

        store.append(&id, vec![Message::user("one")]).await.unwrap();
        let before = store.load(&id).await.unwrap();
        store.append(&id, vec![Message::user("two")]).await.unwrap();
        let after = store.load(&id).await.unwrap();

        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.len(), before.len() + 1);
    }

    #[tokio::test]
    async fn threads_are_independent() {
        let store = store();
        store.append(&"staff-1".into(), vec![Message::user("a")]).await.unwrap();

        assert_eq!(store.load(&"staff-2".into()).await.unwrap().len(), 1);
        assert_eq!(store.thread_count(), 1);
    }

    #[tokio::test]
    async fn reset_returns_to_seed() {
        let store = store();
        let id = ThreadId::from("staff-1");
        store.append(&id, vec![Message::user("a")]).await.unwrap();

        store.reset(&id).await.unwrap();

        let history = store.load(&id).await.unwrap();
        assert_eq!(history, vec![store.seed().clone()]);
    }

    #[tokio::test]
    async fn snapshot_reports_activity() {
        let store = store();
        let id = ThreadId::from("staff-1");
        store.append(&id, vec![Message::user("a")]).await.unwrap();

        let thread = store.snapshot(&id).await.unwrap().unwrap();
        assert_eq!(thread.message_count(), 2);
        assert_eq!(thread.last_message().unwrap().content, "a");
        assert!(thread.last_active_at >= thread.created_at);
    }
}
