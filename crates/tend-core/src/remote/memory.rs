//! In-process remote store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{RemoteError, RemoteResult, RemoteStore, RemoteSubscription, UserDocument};
use crate::util::lock;

/// Remote store held in memory: documents per user plus live subscribers.
///
/// Writes are broadcast to every subscriber of the user before the write
/// call returns, the way a real backend echoes a client's own write back to
/// it. Failures can be injected to exercise degraded paths.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<Mutex<MemoryRemoteState>>,
}

#[derive(Default)]
struct MemoryRemoteState {
    documents: HashMap<String, UserDocument>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    fail_fetches: bool,
    fail_writes: bool,
    write_count: usize,
}

struct Subscriber {
    id: u64,
    user_id: String,
    sender: mpsc::UnboundedSender<UserDocument>,
}

impl MemoryRemoteState {
    fn broadcast(&mut self, user_id: &str) {
        let Some(document) = self.documents.get(user_id) else {
            return;
        };
        self.subscribers.retain(|subscriber| {
            subscriber.user_id != user_id || subscriber.sender.send(document.clone()).is_ok()
        });
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a user's document as another device would, notifying subscribers.
    pub fn put_document(&self, user_id: &str, document: UserDocument) {
        let mut state = lock(&self.inner);
        state.documents.insert(user_id.to_string(), document);
        state.broadcast(user_id);
    }

    /// Merge-write a partial document as another device would.
    pub fn apply_external_write(&self, user_id: &str, partial: UserDocument) {
        let mut state = lock(&self.inner);
        state
            .documents
            .entry(user_id.to_string())
            .or_default()
            .apply_partial(partial);
        state.broadcast(user_id);
    }

    pub fn document(&self, user_id: &str) -> Option<UserDocument> {
        lock(&self.inner).documents.get(user_id).cloned()
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        lock(&self.inner)
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.user_id == user_id)
            .count()
    }

    /// Number of successful writes made through [`RemoteStore::save_user_document`].
    pub fn write_count(&self) -> usize {
        lock(&self.inner).write_count
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        lock(&self.inner).fail_fetches = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.inner).fail_writes = fail;
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn fetch_user_document(&self, user_id: &str) -> RemoteResult<Option<UserDocument>> {
        let state = lock(&self.inner);
        if state.fail_fetches {
            return Err(RemoteError::Unavailable("fetch disabled".to_string()));
        }
        Ok(state.documents.get(user_id).cloned())
    }

    async fn save_user_document(&self, user_id: &str, partial: UserDocument) -> RemoteResult<()> {
        let mut state = lock(&self.inner);
        if state.fail_writes {
            return Err(RemoteError::Unavailable("writes disabled".to_string()));
        }
        state
            .documents
            .entry(user_id.to_string())
            .or_default()
            .apply_partial(partial);
        state.write_count += 1;
        state.broadcast(user_id);
        Ok(())
    }

    fn subscribe(&self, user_id: &str) -> RemoteResult<RemoteSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut state = lock(&self.inner);
            let id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.subscribers.push(Subscriber {
                id,
                user_id: user_id.to_string(),
                sender,
            });
            id
        };

        let inner = Arc::clone(&self.inner);
        Ok(RemoteSubscription::new(receiver, move || {
            lock(&inner)
                .subscribers
                .retain(|subscriber| subscriber.id != id);
        }))
    }
}
