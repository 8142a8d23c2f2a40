//! Session state machine: sign-in, hydration, live updates, sign-out.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::apply::{ApplyOutcome, DomainReport};
use super::context::{Outbound, SyncContext};
use crate::auth::{AuthProvider, AuthUser, Session, SessionVault};
use crate::calendar::{reconcile_events, CalendarBridge, CalendarError, CalendarWindow, NoCalendar};
use crate::error::Result;
use crate::models::Task;
use crate::remote::{RemoteStore, RemoteSubscription, UserDocument};
use crate::state::{CalendarStatus, SessionPhase, SyncState, SyncStatus};
use crate::storage::LocalStore;
use crate::store::{DomainStore, Stores};

/// Drives one installation's sync session.
///
/// Phases move `SignedOut -> Authenticating -> Hydrating -> Subscribed` and
/// back to `SignedOut` on sign-out. Remote failures never leave the
/// orchestrator stuck: hydration errors fall through to `Subscribed` with the
/// local data intact and the error surfaced in [`SyncStatus`].
pub struct SyncOrchestrator<R, A, C = NoCalendar>
where
    R: RemoteStore,
    A: AuthProvider,
    C: CalendarBridge,
{
    remote: R,
    auth: A,
    calendar: C,
    calendar_window: CalendarWindow,
    stores: Stores,
    context: Arc<SyncContext>,
    vault: SessionVault,
    phase: SessionPhase,
    subscription: Option<RemoteSubscription>,
    writer: Option<JoinHandle<()>>,
    calendar_task: Option<JoinHandle<()>>,
}

impl<R, A> SyncOrchestrator<R, A, NoCalendar>
where
    R: RemoteStore,
    A: AuthProvider,
{
    /// Build the stores over `local` and hydrate them from local persistence.
    pub fn new(remote: R, auth: A, local: &LocalStore, context: Arc<SyncContext>) -> Self {
        Self::with_calendar(
            remote,
            auth,
            NoCalendar,
            CalendarWindow::default(),
            local,
            context,
        )
    }
}

impl<R, A, C> SyncOrchestrator<R, A, C>
where
    R: RemoteStore,
    A: AuthProvider,
    C: CalendarBridge,
{
    /// Like [`SyncOrchestrator::new`], importing calendar events into tasks
    /// whenever a session with a calendar token starts.
    pub fn with_calendar(
        remote: R,
        auth: A,
        calendar: C,
        calendar_window: CalendarWindow,
        local: &LocalStore,
        context: Arc<SyncContext>,
    ) -> Self {
        let stores = Stores::new(local, &context);
        stores.load_from_local();
        Self {
            remote,
            auth,
            calendar,
            calendar_window,
            stores,
            context,
            vault: SessionVault::new(local.clone()),
            phase: SessionPhase::SignedOut,
            subscription: None,
            writer: None,
            calendar_task: None,
        }
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub const fn stores(&self) -> &Stores {
        &self.stores
    }

    pub const fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    pub fn status(&self) -> SyncStatus {
        self.context.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.context.subscribe_status()
    }

    /// Resume a session persisted by an earlier run. Returns `false` when
    /// there is nothing to restore.
    pub async fn restore_session(&mut self) -> bool {
        let Some(session) = self.vault.load() else {
            return false;
        };
        if self.phase != SessionPhase::SignedOut {
            self.teardown();
        }
        tracing::info!("Restoring session for user {}", session.user.id);
        self.begin_session(session).await;
        true
    }

    /// Interactive sign-in. Provider failures are returned to the caller.
    pub async fn sign_in(&mut self) -> Result<AuthUser> {
        let grant = match self.auth.sign_in().await {
            Ok(grant) => grant,
            Err(error) => {
                tracing::warn!("Sign-in failed: {}", error);
                self.context.record_error(error.to_string());
                return Err(error.into());
            }
        };

        if self.phase != SessionPhase::SignedOut {
            self.teardown();
        }
        let user = grant.user.clone();
        self.begin_session(Session::from(grant)).await;
        Ok(user)
    }

    /// React to the provider's auth state: start a session for a new
    /// identity, tear down when the identity goes away.
    pub async fn handle_auth_state(&mut self, user: Option<AuthUser>) {
        match user {
            Some(user) => {
                let current = self.context.session();
                if current.is_some_and(|session| session.user.id == user.id) {
                    return;
                }
                if self.phase != SessionPhase::SignedOut {
                    self.teardown();
                }
                let calendar_token = self.vault.calendar_token();
                self.begin_session(Session {
                    user,
                    calendar_token,
                })
                .await;
            }
            None => {
                if self.phase != SessionPhase::SignedOut {
                    tracing::info!("Auth provider ended the session");
                    self.teardown();
                    self.vault.clear();
                }
            }
        }
    }

    /// Wait for the next pushed document and apply it. `None` when no
    /// subscription is active or the feed closed.
    pub async fn next_remote_change(&mut self) -> Option<ApplyOutcome> {
        let subscription = self.subscription.as_mut()?;
        let Some(document) = subscription.next().await else {
            tracing::warn!("Remote subscription closed");
            self.subscription = None;
            self.context.record_error("remote subscription closed");
            return None;
        };
        Some(self.apply_remote_document(&document))
    }

    /// Merge a pushed document into the stores unless it is our own echo.
    pub fn apply_remote_document(&self, document: &UserDocument) -> ApplyOutcome {
        if self.phase != SessionPhase::Subscribed {
            tracing::debug!("Ignoring remote document while {:?}", self.phase);
            return ApplyOutcome::Inactive;
        }
        if self.context.is_echo(document) {
            tracing::debug!("Suppressed echo of a local write");
            return ApplyOutcome::SuppressedEcho;
        }

        let reports = self.commit(document);
        self.context.record_success();
        ApplyOutcome::Applied(reports)
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        if let Some(done) = self.context.request_flush() {
            // A closed channel means the writer is gone; nothing left to wait for.
            done.await.ok();
        }
    }

    /// Tear the session down, forget it locally, then tell the provider.
    /// Local data is kept.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.teardown();
        self.vault.clear();
        tracing::info!("Signed out");
        self.auth.sign_out().await?;
        Ok(())
    }

    /// Follow auth state and remote pushes until the provider goes away.
    pub async fn run(&mut self) {
        let mut auth_state = self.auth.auth_state();
        loop {
            let event = {
                let subscription = self.subscription.as_mut();
                let push = async move {
                    match subscription {
                        Some(subscription) => subscription.next().await,
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    changed = auth_state.changed() => RunEvent::Auth(changed.is_ok()),
                    document = push => RunEvent::Push(document),
                }
            };

            match event {
                RunEvent::Auth(false) => {
                    tracing::debug!("Auth provider dropped; stopping sync loop");
                    return;
                }
                RunEvent::Auth(true) => {
                    let user = auth_state.borrow_and_update().clone();
                    self.handle_auth_state(user).await;
                }
                RunEvent::Push(Some(document)) => {
                    self.apply_remote_document(&document);
                }
                RunEvent::Push(None) => {
                    tracing::warn!("Remote subscription closed");
                    self.subscription = None;
                    self.context.record_error("remote subscription closed");
                }
            }
        }
    }

    async fn begin_session(&mut self, session: Session) {
        self.set_phase(SessionPhase::Authenticating);
        self.vault.save(&session);

        let user_id = session.user.id.clone();
        let calendar_token = session.calendar_token.clone();
        let user = session.user.clone();

        let (outbound, receiver) = mpsc::unbounded_channel();
        self.context.attach(session, outbound);
        self.context.update_status(|status| {
            status.state = SyncState::Syncing;
            status.user = Some(user);
            status.last_error = None;
            status.calendar = CalendarStatus::Idle;
        });
        self.writer = Some(tokio::spawn(run_writer(
            self.remote.clone(),
            Arc::clone(&self.context),
            user_id.clone(),
            receiver,
        )));
        tracing::info!("Session started for user {}", user_id);

        self.set_phase(SessionPhase::Hydrating);
        let hydrated = match self.remote.fetch_user_document(&user_id).await {
            Ok(document) => {
                if let Some(document) = document.as_ref() {
                    let reports = self.commit(document);
                    log_reports("Hydrated", &reports);
                } else {
                    tracing::info!("No remote document yet; keeping local data");
                }
                let seeded = self.stores.seed_remote(document.as_ref());
                if !seeded.is_empty() {
                    tracing::info!("Uploading local-only domains: {:?}", seeded);
                }
                true
            }
            Err(error) => {
                tracing::warn!("Hydration failed, continuing with local data: {}", error);
                self.context
                    .record_error(format!("hydration failed: {error}"));
                false
            }
        };

        let subscribed = match self.remote.subscribe(&user_id) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                true
            }
            Err(error) => {
                tracing::warn!("Remote subscription failed: {}", error);
                self.context
                    .record_error(format!("subscription failed: {error}"));
                false
            }
        };

        self.set_phase(SessionPhase::Subscribed);
        if hydrated && subscribed {
            self.context.record_success();
        }

        if let Some(token) = calendar_token {
            self.spawn_calendar_import(token);
        }
    }

    fn commit(&self, document: &UserDocument) -> Vec<DomainReport> {
        let reports = self.stores.reconcile_document(document);
        if reports
            .iter()
            .any(|report| report.changed_local() || report.wrote_back())
        {
            self.context.arm_echo_window();
        }
        reports
    }

    fn spawn_calendar_import(&mut self, token: String) {
        let import = CalendarImportJob {
            calendar: self.calendar.clone(),
            window: self.calendar_window,
            tasks: self.stores.tasks.clone(),
            context: Arc::clone(&self.context),
            vault: self.vault.clone(),
        };
        self.calendar_task = Some(tokio::spawn(import.run(token)));
    }

    fn teardown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(calendar_task) = self.calendar_task.take() {
            calendar_task.abort();
        }
        self.context.detach();
        self.context.update_status(|status| {
            status.state = SyncState::Offline;
            status.user = None;
            status.last_error = None;
            status.calendar = CalendarStatus::Idle;
        });
        self.set_phase(SessionPhase::SignedOut);
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::info!("Sync phase {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
        self.context.update_status(|status| status.phase = phase);
    }
}

impl<R, A, C> Drop for SyncOrchestrator<R, A, C>
where
    R: RemoteStore,
    A: AuthProvider,
    C: CalendarBridge,
{
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(calendar_task) = self.calendar_task.take() {
            calendar_task.abort();
        }
    }
}

enum RunEvent {
    Auth(bool),
    Push(Option<UserDocument>),
}

/// Drain queued writes to the remote store, in order.
async fn run_writer<R: RemoteStore>(
    remote: R,
    context: Arc<SyncContext>,
    user_id: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Write(write) => {
                let origin = context.next_origin();
                let revision = origin.revision;
                let partial =
                    UserDocument::with_domain(write.domain, write.payload).with_origin(origin);
                match remote.save_user_document(&user_id, partial).await {
                    Ok(()) => {
                        tracing::debug!("Wrote {} (revision {})", write.domain, revision);
                        context.record_success();
                    }
                    Err(error) => {
                        context.release_revision(revision);
                        tracing::warn!("Remote write of {} failed: {}", write.domain, error);
                        context.record_error(format!("write of {} failed: {error}", write.domain));
                    }
                }
            }
            Outbound::Flush(done) => {
                done.send(()).ok();
            }
        }
    }
}

struct CalendarImportJob<C> {
    calendar: C,
    window: CalendarWindow,
    tasks: DomainStore<Task>,
    context: Arc<SyncContext>,
    vault: SessionVault,
}

impl<C: CalendarBridge> CalendarImportJob<C> {
    async fn run(self, token: String) {
        let (range_start, range_end) = self.window.range_around(Utc::now());
        let fetched = self
            .calendar
            .fetch_events(&token, range_start, range_end)
            .await;
        if !self.context.is_authenticated() {
            return;
        }

        let calendar_status = match fetched {
            Ok(events) => {
                let import = reconcile_events(&self.tasks, &events);
                CalendarStatus::Synced {
                    at: Utc::now(),
                    imported: import.imported(),
                }
            }
            Err(CalendarError::TokenExpired) => {
                tracing::warn!("Calendar token expired; re-authentication required");
                self.vault.clear_calendar_token();
                self.context.clear_calendar_token();
                CalendarStatus::TokenExpired
            }
            Err(error) => {
                tracing::warn!("Calendar import failed: {}", error);
                CalendarStatus::Failed {
                    message: error.to_string(),
                }
            }
        };
        self.context
            .update_status(|status| status.calendar = calendar_status);
    }
}

fn log_reports(label: &str, reports: &[DomainReport]) {
    let changed: Vec<String> = reports
        .iter()
        .filter(|report| report.changed_local())
        .map(|report| report.domain.to_string())
        .collect();
    tracing::info!(
        "{}: {} of {} domains changed locally {:?}",
        label,
        changed.len(),
        reports.len(),
        changed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::auth::FixedAuthProvider;
    use crate::calendar::{CalendarEvent, CalendarResult};
    use crate::models::{Cadence, Habit};
    use crate::remote::{MemoryRemoteStore, WriteOrigin};
    use crate::sync::{DomainOutcome, EchoSuppression};

    const USER: &str = "user-1";

    type Orchestrator<C = NoCalendar> = SyncOrchestrator<MemoryRemoteStore, FixedAuthProvider, C>;

    fn user() -> AuthUser {
        AuthUser {
            id: USER.to_string(),
            email: Some("user@example.com".to_string()),
        }
    }

    fn auth(token: Option<&str>) -> FixedAuthProvider {
        FixedAuthProvider::new(user(), token.map(str::to_string))
    }

    fn orchestrator(
        remote: &MemoryRemoteStore,
        local: &LocalStore,
        echo: EchoSuppression,
    ) -> Orchestrator {
        let context = Arc::new(SyncContext::new("client-a", echo));
        SyncOrchestrator::new(remote.clone(), auth(None), local, context)
    }

    fn no_window() -> EchoSuppression {
        EchoSuppression::Window(Duration::ZERO)
    }

    fn task(id: &str, title: &str, minute: u32) -> Task {
        let mut task = Task::new(title);
        task.id = id.to_string();
        task.updated_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap());
        task
    }

    fn remote_tasks(remote: &MemoryRemoteStore) -> Vec<Task> {
        let document = remote.document(USER).unwrap_or_default();
        match document.decode::<Task>() {
            crate::remote::Decoded::Records { records, .. } => records,
            _ => Vec::new(),
        }
    }

    fn document_with_tasks(tasks: &[Task]) -> UserDocument {
        let mut document = UserDocument::default();
        document.insert_records(tasks).unwrap();
        document
    }

    #[tokio::test]
    async fn hydration_merges_remote_into_local() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        local
            .save("tasks", &vec![task("t1", "Buy milk", 0)])
            .unwrap();
        remote.put_document(
            USER,
            document_with_tasks(&[task("t1", "Buy milk and eggs", 5), task("t2", "Ancient", 1)]),
        );

        let mut orchestrator = orchestrator(&remote, &local, no_window());
        assert_eq!(orchestrator.stores().tasks.len(), 1);

        orchestrator.sign_in().await.unwrap();

        assert_eq!(orchestrator.phase(), SessionPhase::Subscribed);
        let titles: Vec<String> = orchestrator
            .stores()
            .tasks
            .get_all()
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["Buy milk and eggs", "Ancient"]);

        let status = orchestrator.status();
        assert_eq!(status.state, SyncState::Synced);
        assert_eq!(status.user, Some(user()));
        assert_eq!(remote.subscriber_count(USER), 1);

        // Committed results survive a restart.
        let persisted: Vec<Task> = local.load("tasks", Vec::new());
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn newer_local_records_are_written_back() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        local
            .save("tasks", &vec![task("t1", "Buy milk and eggs", 5)])
            .unwrap();
        remote.put_document(USER, document_with_tasks(&[task("t1", "Buy milk", 0)]));

        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();
        orchestrator.flush().await;

        let remote_titles: Vec<String> = remote_tasks(&remote)
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(remote_titles, vec!["Buy milk and eggs"]);
    }

    #[tokio::test]
    async fn local_only_domains_seed_an_empty_remote() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        local
            .save("habits", &vec![Habit::new("Stretch", Cadence::Daily)])
            .unwrap();

        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();
        orchestrator.flush().await;

        let document = remote.document(USER).unwrap();
        assert!(document.domain(crate::Domain::Habits).is_some());
        assert!(document.domain(crate::Domain::Tasks).is_none());
    }

    #[tokio::test]
    async fn local_mutation_echo_does_not_loop() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();

        let stored = orchestrator.stores().tasks.mutate(Task::new("Buy milk"));
        orchestrator.flush().await;
        assert_eq!(remote.write_count(), 1);

        let outcome = orchestrator.next_remote_change().await.unwrap();
        assert!(!outcome.changed_local());
        assert!(outcome.reports().iter().all(|report| !report.wrote_back()));

        orchestrator.flush().await;
        assert_eq!(remote.write_count(), 1);
        assert_eq!(orchestrator.stores().tasks.get_all(), vec![stored]);

        let quiet =
            tokio::time::timeout(Duration::from_millis(50), orchestrator.next_remote_change())
                .await;
        assert!(quiet.is_err(), "no further pushes expected");
    }

    #[tokio::test]
    async fn pushes_from_other_devices_are_merged() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();

        remote.apply_external_write(USER, document_with_tasks(&[task("t9", "From phone", 3)]));
        let outcome = orchestrator.next_remote_change().await.unwrap();

        assert!(outcome.changed_local());
        assert_eq!(
            orchestrator.stores().tasks.get("t9").unwrap().title,
            "From phone"
        );
    }

    #[tokio::test]
    async fn malformed_domain_in_push_leaves_other_domains_applying() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();

        let partial: UserDocument = serde_json::from_value(json!({
            "tasks": {"oops": true},
            "habits": [Habit::new("Meditate", Cadence::Daily)]
        }))
        .unwrap();
        remote.apply_external_write(USER, partial);

        let outcome = orchestrator.next_remote_change().await.unwrap();
        let tasks_report = &outcome.reports()[0];
        assert!(matches!(tasks_report.outcome, DomainOutcome::Skipped { .. }));
        assert_eq!(orchestrator.stores().habits.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn echo_window_skips_pushes_right_after_a_commit() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        remote.put_document(USER, document_with_tasks(&[task("t1", "Remote", 0)]));
        let mut orchestrator = orchestrator(&remote, &local, EchoSuppression::default());
        orchestrator.sign_in().await.unwrap();
        assert_eq!(orchestrator.stores().tasks.len(), 1);

        remote.apply_external_write(USER, document_with_tasks(&[task("t1", "Remote", 0)]));
        assert_eq!(
            orchestrator.next_remote_change().await,
            Some(ApplyOutcome::SuppressedEcho)
        );

        tokio::time::advance(Duration::from_millis(1001)).await;
        remote.apply_external_write(USER, document_with_tasks(&[task("t1", "Edited", 7)]));
        let outcome = orchestrator.next_remote_change().await.unwrap();
        assert!(outcome.changed_local());
    }

    #[tokio::test]
    async fn tied_edits_on_two_devices_do_not_ping_pong() {
        let remote = MemoryRemoteStore::new();
        let device = |client_id: &str, title: &str| {
            let local = LocalStore::in_memory();
            let mut shared = task("t1", title, 0);
            shared.updated_at = None;
            local.save("tasks", &vec![shared]).unwrap();
            let context = Arc::new(SyncContext::new(client_id, EchoSuppression::Revision));
            SyncOrchestrator::new(remote.clone(), auth(None), &local, context)
        };
        let mut phone: Orchestrator = device("client-a", "from phone");
        let mut laptop: Orchestrator = device("client-b", "from laptop");

        phone.sign_in().await.unwrap();
        phone.flush().await;
        laptop.sign_in().await.unwrap();
        laptop.flush().await;
        // Only the phone's seed of an empty remote was written.
        assert_eq!(remote.write_count(), 1);

        for _ in 0..5 {
            for client in [&mut phone, &mut laptop] {
                while let Ok(Some(_)) =
                    tokio::time::timeout(Duration::from_millis(20), client.next_remote_change())
                        .await
                {}
                client.flush().await;
            }
        }

        assert_eq!(remote.write_count(), 1);
        assert_eq!(phone.stores().tasks.get("t1").unwrap().title, "from phone");
        assert_eq!(laptop.stores().tasks.get("t1").unwrap().title, "from laptop");
    }

    #[tokio::test]
    async fn run_loop_follows_pushes_and_auth_state() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let provider = auth(None);
        let context = Arc::new(SyncContext::new("client-a", no_window()));
        let mut orchestrator: Orchestrator =
            SyncOrchestrator::new(remote.clone(), provider.clone(), &local, context);
        orchestrator.sign_in().await.unwrap();

        let stores = orchestrator.stores().clone();
        let mut changes = stores.tasks.subscribe();
        changes.borrow_and_update();
        let mut status = orchestrator.subscribe_status();
        let vault = SessionVault::new(local.clone());
        assert!(vault.load().is_some());

        let script = async {
            remote.apply_external_write(USER, document_with_tasks(&[task("t9", "From phone", 3)]));
            tokio::time::timeout(Duration::from_secs(1), changes.changed())
                .await
                .expect("push applied")
                .unwrap();
            assert_eq!(stores.tasks.get("t9").unwrap().title, "From phone");

            provider.expire();
            tokio::time::timeout(
                Duration::from_secs(1),
                status.wait_for(|status| status.phase == SessionPhase::SignedOut),
            )
            .await
            .expect("signed out")
            .unwrap();
            assert!(vault.load().is_none());
            assert_eq!(remote.subscriber_count(USER), 0);

            provider.shut_down();
        };

        tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(orchestrator.run(), script)
        })
        .await
        .expect("run loop stops once the provider goes away");

        assert_eq!(orchestrator.phase(), SessionPhase::SignedOut);
        // Local data outlives the session.
        assert!(orchestrator.stores().tasks.get("t9").is_some());
    }

    #[tokio::test]
    async fn revision_mode_skips_exactly_our_own_writes() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, EchoSuppression::Revision);
        orchestrator.sign_in().await.unwrap();

        orchestrator.stores().tasks.mutate(Task::new("Mine"));
        orchestrator.flush().await;
        assert_eq!(
            orchestrator.next_remote_change().await,
            Some(ApplyOutcome::SuppressedEcho)
        );

        let foreign = document_with_tasks(&[task("t2", "Theirs", 1)]).with_origin(WriteOrigin {
            client_id: "client-b".to_string(),
            revision: 1,
        });
        remote.apply_external_write(USER, foreign);
        let outcome = orchestrator.next_remote_change().await.unwrap();
        assert!(outcome.changed_local());
        assert!(orchestrator.stores().tasks.get("t2").is_some());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_local_data_and_still_subscribes() {
        let remote = MemoryRemoteStore::new();
        remote.set_fail_fetches(true);
        let local = LocalStore::in_memory();
        local.save("tasks", &vec![task("t1", "Offline", 0)]).unwrap();

        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();

        assert_eq!(orchestrator.phase(), SessionPhase::Subscribed);
        assert_eq!(orchestrator.stores().tasks.len(), 1);
        let status = orchestrator.status();
        assert_eq!(status.state, SyncState::Error);
        assert!(status.last_error.unwrap().contains("hydration"));
        assert_eq!(remote.subscriber_count(USER), 1);
    }

    #[tokio::test]
    async fn write_failures_surface_in_status_without_touching_local_state() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();

        remote.set_fail_writes(true);
        orchestrator.stores().tasks.mutate(Task::new("Still saved"));
        orchestrator.flush().await;

        assert_eq!(orchestrator.status().state, SyncState::Error);
        assert_eq!(orchestrator.stores().tasks.len(), 1);
        let persisted: Vec<Task> = local.load("tasks", Vec::new());
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn sign_in_errors_propagate() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let context = Arc::new(SyncContext::new("client-a", no_window()));
        let provider = auth(None);
        provider.reject_sign_ins(Some("account locked"));
        let mut orchestrator = SyncOrchestrator::new(remote, provider, &local, context);

        let error = orchestrator.sign_in().await.unwrap_err();
        assert!(matches!(
            error,
            crate::Error::Auth(crate::auth::AuthError::Provider(_))
        ));
        assert!(error.to_string().contains("account locked"));
        assert_eq!(orchestrator.phase(), SessionPhase::SignedOut);
        assert_eq!(orchestrator.status().state, SyncState::Error);
    }

    #[tokio::test]
    async fn sign_out_tears_everything_down_but_keeps_data() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();
        orchestrator.stores().tasks.mutate(Task::new("Keep me"));
        orchestrator.flush().await;
        let writes = remote.write_count();

        orchestrator.sign_out().await.unwrap();

        assert_eq!(orchestrator.phase(), SessionPhase::SignedOut);
        assert_eq!(remote.subscriber_count(USER), 0);
        assert!(!orchestrator.context().is_authenticated());
        assert_eq!(orchestrator.status().state, SyncState::Offline);
        assert!(orchestrator.next_remote_change().await.is_none());

        orchestrator.stores().tasks.mutate(Task::new("Offline edit"));
        assert_eq!(remote.write_count(), writes);
        assert_eq!(orchestrator.stores().tasks.len(), 2);

        assert!(!orchestrator.restore_session().await);
    }

    #[tokio::test]
    async fn pushes_after_sign_out_are_ignored() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());
        orchestrator.sign_in().await.unwrap();
        orchestrator.sign_out().await.unwrap();

        let outcome =
            orchestrator.apply_remote_document(&document_with_tasks(&[task("t1", "Late", 0)]));
        assert_eq!(outcome, ApplyOutcome::Inactive);
        assert!(orchestrator.stores().tasks.is_empty());
    }

    #[tokio::test]
    async fn persisted_session_is_restored() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        {
            let mut first = orchestrator(&remote, &local, no_window());
            first.sign_in().await.unwrap();
        }

        let mut second = orchestrator(&remote, &local, no_window());
        assert!(second.restore_session().await);
        assert_eq!(second.phase(), SessionPhase::Subscribed);
        assert_eq!(second.status().user, Some(user()));
    }

    #[tokio::test]
    async fn auth_state_changes_drive_the_session() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let mut orchestrator = orchestrator(&remote, &local, no_window());

        orchestrator.handle_auth_state(Some(user())).await;
        assert_eq!(orchestrator.phase(), SessionPhase::Subscribed);

        // Same identity again is a no-op.
        orchestrator.handle_auth_state(Some(user())).await;
        assert_eq!(remote.subscriber_count(USER), 1);

        orchestrator.handle_auth_state(None).await;
        assert_eq!(orchestrator.phase(), SessionPhase::SignedOut);
        assert_eq!(remote.subscriber_count(USER), 0);
    }

    #[derive(Clone)]
    struct StubCalendar {
        expired: bool,
    }

    impl CalendarBridge for StubCalendar {
        async fn fetch_events(
            &self,
            _token: &str,
            range_start: chrono::DateTime<Utc>,
            _range_end: chrono::DateTime<Utc>,
        ) -> CalendarResult<Vec<CalendarEvent>> {
            if self.expired {
                return Err(CalendarError::TokenExpired);
            }
            Ok(vec![CalendarEvent {
                id: "evt-1".to_string(),
                title: "Dentist".to_string(),
                description: None,
                start: range_start + chrono::Duration::days(1),
                end: None,
                all_day: false,
            }])
        }
    }

    async fn signed_in_with_calendar(
        remote: &MemoryRemoteStore,
        local: &LocalStore,
        expired: bool,
    ) -> Orchestrator<StubCalendar> {
        let context = Arc::new(SyncContext::new("client-a", no_window()));
        let mut orchestrator = SyncOrchestrator::with_calendar(
            remote.clone(),
            auth(Some("calendar-token")),
            StubCalendar { expired },
            CalendarWindow::default(),
            local,
            context,
        );
        orchestrator.sign_in().await.unwrap();

        let mut status = orchestrator.subscribe_status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.calendar != CalendarStatus::Idle),
        )
        .await
        .unwrap()
        .unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn calendar_events_become_synced_tasks() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let orchestrator = signed_in_with_calendar(&remote, &local, false).await;

        assert!(matches!(
            orchestrator.status().calendar,
            CalendarStatus::Synced { imported: 1, .. }
        ));
        let tasks = orchestrator.stores().tasks.get_all();
        assert_eq!(tasks[0].external_id.as_deref(), Some("evt-1"));

        orchestrator.flush().await;
        assert_eq!(remote_tasks(&remote).len(), 1);
    }

    #[tokio::test]
    async fn expired_calendar_token_is_reported_and_forgotten() {
        let remote = MemoryRemoteStore::new();
        let local = LocalStore::in_memory();
        let orchestrator = signed_in_with_calendar(&remote, &local, true).await;

        let status = orchestrator.status();
        assert!(status.needs_reauthentication());
        assert_eq!(orchestrator.phase(), SessionPhase::Subscribed);
        assert!(SessionVault::new(local.clone()).calendar_token().is_none());
        assert!(orchestrator.stores().tasks.is_empty());
    }
}
