//! Remote document store contract.

mod document;
mod memory;

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

pub use document::{Decoded, UserDocument, WriteOrigin};
pub use memory::MemoryRemoteStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Per-user document storage with live change delivery.
pub trait RemoteStore: Clone + Send + Sync + 'static {
    /// One-shot read of the full document; `None` if the user has none yet.
    fn fetch_user_document(
        &self,
        user_id: &str,
    ) -> impl Future<Output = RemoteResult<Option<UserDocument>>> + Send;

    /// Merge-write: domains missing from `partial` must not be clobbered.
    fn save_user_document(
        &self,
        user_id: &str,
        partial: UserDocument,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Live feed of the full document after every remote mutation.
    fn subscribe(&self, user_id: &str) -> RemoteResult<RemoteSubscription>;
}

/// Handle to a live remote subscription.
///
/// Unsubscribing is idempotent and also happens on drop, so no delivery can
/// outlive the handle.
pub struct RemoteSubscription {
    receiver: mpsc::UnboundedReceiver<UserDocument>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl RemoteSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<UserDocument>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Wait for the next pushed document; `None` once closed.
    pub async fn next(&mut self) -> Option<UserDocument> {
        self.receiver.recv().await
    }

    pub const fn is_active(&self) -> bool {
        self.on_unsubscribe.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
        }
        self.receiver.close();
    }
}

impl Drop for RemoteSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for RemoteSubscription {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteSubscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
