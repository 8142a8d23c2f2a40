//! Session-scoped state shared between the orchestrator and the stores.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::auth::Session;
use crate::models::Domain;
use crate::remote::{UserDocument, WriteOrigin};
use crate::state::{SyncState, SyncStatus};
use crate::util::lock;

const DEFAULT_ECHO_WINDOW: Duration = Duration::from_millis(1000);
const MAX_PENDING_REVISIONS: usize = 256;

/// How pushes caused by this client's own writes are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoSuppression {
    /// Best effort: skip every push for this long after committing a remote
    /// update. Late echoes are still harmless because merging is idempotent.
    Window(Duration),
    /// Skip pushes whose `_origin` names this client and a revision it wrote.
    Revision,
}

impl Default for EchoSuppression {
    fn default() -> Self {
        Self::Window(DEFAULT_ECHO_WINDOW)
    }
}

/// One whole-collection write waiting for the writer task.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutboundWrite {
    pub domain: Domain,
    pub payload: Value,
}

#[derive(Debug)]
pub(crate) enum Outbound {
    Write(OutboundWrite),
    /// Answered once every write queued before it has been attempted.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct EchoGuard {
    applying_until: Option<Instant>,
    pending_revisions: VecDeque<u64>,
}

/// Explicit home for session, write queue, status and echo guard.
#[derive(Debug)]
pub struct SyncContext {
    client_id: String,
    echo: EchoSuppression,
    session: Mutex<Option<Session>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    revision: AtomicU64,
    status: watch::Sender<SyncStatus>,
    guard: Mutex<EchoGuard>,
}

impl SyncContext {
    pub fn new(client_id: impl Into<String>, echo: EchoSuppression) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        // Seeded from the clock so revisions keep increasing across restarts.
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self {
            client_id: client_id.into(),
            echo,
            session: Mutex::new(None),
            outbound: Mutex::new(None),
            revision: AtomicU64::new(seed),
            status,
            guard: Mutex::new(EchoGuard::default()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub const fn echo_suppression(&self) -> EchoSuppression {
        self.echo
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.outbound).is_some()
    }

    pub(crate) fn attach(&self, session: Session, outbound: mpsc::UnboundedSender<Outbound>) {
        *lock(&self.session) = Some(session);
        *lock(&self.outbound) = Some(outbound);
    }

    /// Drop the session and close the write queue.
    pub(crate) fn detach(&self) -> Option<Session> {
        lock(&self.outbound).take();
        let mut guard = lock(&self.guard);
        guard.applying_until = None;
        guard.pending_revisions.clear();
        drop(guard);
        lock(&self.session).take()
    }

    pub(crate) fn clear_calendar_token(&self) {
        if let Some(session) = lock(&self.session).as_mut() {
            session.calendar_token = None;
        }
    }

    /// Queue a remote write of `payload` for `domain`. Returns `false` when
    /// there is no authenticated session to write for.
    pub(crate) fn queue_write(&self, domain: Domain, payload: Value) -> bool {
        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            return false;
        };
        sender
            .send(Outbound::Write(OutboundWrite { domain, payload }))
            .is_ok()
    }

    pub(crate) fn request_flush(&self) -> Option<oneshot::Receiver<()>> {
        let outbound = lock(&self.outbound);
        let sender = outbound.as_ref()?;
        let (done, wait) = oneshot::channel();
        sender.send(Outbound::Flush(done)).ok()?;
        Some(wait)
    }

    /// Allocate the origin tag for the next outbound write.
    pub(crate) fn next_origin(&self) -> WriteOrigin {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        if self.echo == EchoSuppression::Revision {
            let mut guard = lock(&self.guard);
            guard.pending_revisions.push_back(revision);
            while guard.pending_revisions.len() > MAX_PENDING_REVISIONS {
                guard.pending_revisions.pop_front();
            }
        }
        WriteOrigin {
            client_id: self.client_id.clone(),
            revision,
        }
    }

    /// Forget a revision whose write never reached the remote.
    pub(crate) fn release_revision(&self, revision: u64) {
        lock(&self.guard)
            .pending_revisions
            .retain(|pending| *pending != revision);
    }

    /// Start the echo window after committing a remote update.
    pub(crate) fn arm_echo_window(&self) {
        if let EchoSuppression::Window(window) = self.echo {
            if !window.is_zero() {
                lock(&self.guard).applying_until = Some(Instant::now() + window);
            }
        }
    }

    /// Whether `document` should be skipped as this client's own echo.
    pub(crate) fn is_echo(&self, document: &UserDocument) -> bool {
        let mut guard = lock(&self.guard);
        match self.echo {
            EchoSuppression::Window(_) => match guard.applying_until {
                Some(until) if Instant::now() < until => true,
                Some(_) => {
                    guard.applying_until = None;
                    false
                }
                None => false,
            },
            EchoSuppression::Revision => {
                let Some(origin) = document.origin.as_ref() else {
                    return false;
                };
                if origin.client_id != self.client_id {
                    return false;
                }
                let before = guard.pending_revisions.len();
                guard
                    .pending_revisions
                    .retain(|pending| *pending != origin.revision);
                guard.pending_revisions.len() != before
            }
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub(crate) fn update_status<F>(&self, change: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        self.status.send_modify(change);
    }

    pub(crate) fn record_success(&self) {
        self.update_status(|status| {
            status.state = SyncState::Synced;
            status.last_synced_at = Some(Utc::now());
            status.last_error = None;
        });
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update_status(|status| {
            status.state = SyncState::Error;
            status.last_error = Some(message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;

    fn session() -> Session {
        Session {
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
            },
            calendar_token: Some("token".to_string()),
        }
    }

    #[test]
    fn writes_are_queued_only_while_attached() {
        let context = SyncContext::new("client-a", EchoSuppression::default());
        assert!(!context.queue_write(Domain::Tasks, Value::Array(Vec::new())));

        let (sender, mut receiver) = mpsc::unbounded_channel();
        context.attach(session(), sender);
        assert!(context.is_authenticated());
        assert!(context.queue_write(Domain::Tasks, Value::Array(Vec::new())));
        assert!(matches!(receiver.try_recv(), Ok(Outbound::Write(_))));

        assert_eq!(context.detach(), Some(session()));
        assert!(!context.queue_write(Domain::Tasks, Value::Array(Vec::new())));
    }

    #[test]
    fn revisions_increase_monotonically() {
        let context = SyncContext::new("client-a", EchoSuppression::Revision);
        let first = context.next_origin();
        let second = context.next_origin();
        assert!(second.revision > first.revision);
        assert_eq!(second.client_id, "client-a");
    }

    #[test]
    fn revision_mode_matches_only_own_pending_writes() {
        let context = SyncContext::new("client-a", EchoSuppression::Revision);
        let origin = context.next_origin();

        let foreign = UserDocument::default().with_origin(WriteOrigin {
            client_id: "client-b".to_string(),
            revision: origin.revision,
        });
        assert!(!context.is_echo(&foreign));
        assert!(!context.is_echo(&UserDocument::default()));

        let own = UserDocument::default().with_origin(origin);
        assert!(context.is_echo(&own));
        // Each written revision is absorbed once.
        assert!(!context.is_echo(&own));
    }

    #[test]
    fn released_revisions_are_not_treated_as_echoes() {
        let context = SyncContext::new("client-a", EchoSuppression::Revision);
        let origin = context.next_origin();
        context.release_revision(origin.revision);
        assert!(!context.is_echo(&UserDocument::default().with_origin(origin)));
    }

    #[tokio::test(start_paused = true)]
    async fn window_mode_suppresses_until_the_window_elapses() {
        let context = SyncContext::new(
            "client-a",
            EchoSuppression::Window(Duration::from_millis(1000)),
        );
        let document = UserDocument::default();
        assert!(!context.is_echo(&document));

        context.arm_echo_window();
        assert!(context.is_echo(&document));

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(!context.is_echo(&document));
    }

    #[test]
    fn status_errors_clear_on_success() {
        let context = SyncContext::new("client-a", EchoSuppression::default());
        context.record_error("offline");
        assert_eq!(context.status().state, SyncState::Error);
        context.record_success();
        let status = context.status();
        assert_eq!(status.state, SyncState::Synced);
        assert!(status.last_error.is_none());
    }
}
