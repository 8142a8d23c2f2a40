//! Reactive in-memory collections, one per domain.
//!
//! A [`DomainStore`] is the single writer-facing handle on a domain's records.
//! UI-initiated changes go through [`DomainStore::mutate`] and
//! [`DomainStore::remove`], which stamp, persist locally and queue a remote
//! write when a session is active. The orchestrator commits merge results
//! through [`DomainStore::replace_all`], which never writes remotely.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::Result;
use crate::merge::{self, MergeOutcome};
use crate::models::timestamp::{next_stamp, stamp_millis};
use crate::models::{
    Debt, Domain, FocusSession, Goal, Habit, Investment, Subscription, SyncRecord, Task, TaskList,
    Transaction,
};
use crate::remote::UserDocument;
use crate::storage::LocalStore;
use crate::sync::SyncContext;
use crate::util::lock;

/// Result of [`DomainStore::commit_remote`].
#[derive(Debug)]
pub(crate) struct RemoteCommit<R> {
    pub outcome: MergeOutcome<R>,
    pub local_changed: bool,
    /// The remote copy lacks records or holds older ones
    pub remote_stale: bool,
    pub write_back: bool,
}

pub struct DomainStore<R: SyncRecord> {
    records: Arc<Mutex<Vec<R>>>,
    local: LocalStore,
    context: Arc<SyncContext>,
    changes: Arc<watch::Sender<u64>>,
}

impl<R: SyncRecord> Clone for DomainStore<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            local: self.local.clone(),
            context: Arc::clone(&self.context),
            changes: Arc::clone(&self.changes),
        }
    }
}

impl<R: SyncRecord> std::fmt::Debug for DomainStore<R> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DomainStore")
            .field("domain", &R::DOMAIN)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<R: SyncRecord> DomainStore<R> {
    /// Empty store; call [`Self::load_from_local`] to hydrate it.
    pub fn new(local: LocalStore, context: Arc<SyncContext>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            local,
            context,
            changes: Arc::new(changes),
        }
    }

    pub const fn domain(&self) -> Domain {
        R::DOMAIN
    }

    /// Replace memory with what is persisted locally.
    pub fn load_from_local(&self) -> usize {
        let loaded: Vec<R> = self.local.load(R::DOMAIN.key(), Vec::new());
        // Persisted data may predate id dedup; collapse it the same way a merge would.
        let loaded = merge::merge(loaded, Vec::new());
        let count = loaded.len();
        *lock(&self.records) = loaded;
        self.notify();
        count
    }

    pub fn get_all(&self) -> Vec<R> {
        lock(&self.records).clone()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        lock(&self.records)
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Insert or update `record`, stamping it as the newest version.
    ///
    /// Returns the record as stored.
    pub fn mutate(&self, mut record: R) -> R {
        {
            let mut records = lock(&self.records);
            let position = records.iter().position(|existing| existing.id() == record.id());
            let previous = position
                .map(|index| records[index].updated_at())
                .into_iter()
                .chain([record.updated_at()])
                .max_by_key(|stamp| stamp_millis(*stamp))
                .flatten();
            record.set_updated_at(next_stamp(previous));

            match position {
                Some(index) => records[index] = record.clone(),
                None => records.push(record.clone()),
            }
            self.persist(&records, true);
        }

        self.notify();
        record
    }

    /// Read-modify-write of one record through [`Self::mutate`].
    pub fn update<F>(&self, id: &str, change: F) -> Option<R>
    where
        F: FnOnce(&mut R),
    {
        let mut record = self.get(id)?;
        change(&mut record);
        Some(self.mutate(record))
    }

    /// Hard-delete `id`. Returns the removed record, if any.
    pub fn remove(&self, id: &str) -> Option<R> {
        let removed = {
            let mut records = lock(&self.records);
            let index = records.iter().position(|record| record.id() == id)?;
            let removed = records.remove(index);
            self.persist(&records, true);
            removed
        };

        self.notify();
        Some(removed)
    }

    /// Atomically replace the whole collection. Local persistence only.
    pub fn replace_all(&self, records: Vec<R>) {
        {
            let mut current = lock(&self.records);
            *current = records;
            self.persist(&current, false);
        }
        self.notify();
    }

    /// Merge `remote` into the current collection and commit the result,
    /// queueing a write-back when the merged copy is ahead of the remote one.
    /// Write-back is withheld when `dropped` remote entries were unreadable.
    pub(crate) fn commit_remote(&self, remote: Vec<R>, dropped: usize) -> RemoteCommit<R> {
        let commit = {
            let mut records = lock(&self.records);
            let outcome = merge::reconcile(records.clone(), remote.clone());
            let local_changed = outcome.records != *records;
            if local_changed {
                records.clone_from(&outcome.records);
                self.persist(&records, false);
            }
            let remote_stale = merge::is_ahead_of(&records, &remote);
            let write_back = remote_stale && dropped == 0 && self.queue_remote_write(&records);
            RemoteCommit {
                outcome,
                local_changed,
                remote_stale,
                write_back,
            }
        };

        if commit.local_changed {
            self.notify();
        }
        commit
    }

    /// Queue the current collection as a remote write, unless it is empty.
    pub(crate) fn queue_snapshot(&self) -> bool {
        let records = lock(&self.records);
        !records.is_empty() && self.queue_remote_write(&records)
    }

    /// Queue the whole collection as a remote write. No-op while signed out.
    fn queue_remote_write(&self, records: &[R]) -> bool {
        match serde_json::to_value(records) {
            Ok(payload) => self.context.queue_write(R::DOMAIN, payload),
            Err(error) => {
                tracing::warn!("Failed to encode {} for remote write: {}", R::DOMAIN, error);
                false
            }
        }
    }

    /// Watch channel bumped on every change to this collection.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Callers hold the records lock so saves land in mutation order.
    fn persist(&self, records: &[R], propagate: bool) {
        if let Err(error) = self.local.save(R::DOMAIN.key(), records) {
            tracing::warn!("Failed to persist {} locally: {}", R::DOMAIN, error);
        }
        if propagate {
            self.queue_remote_write(records);
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

/// Every domain store of one installation.
#[derive(Clone, Debug)]
pub struct Stores {
    pub tasks: DomainStore<Task>,
    pub lists: DomainStore<TaskList>,
    pub habits: DomainStore<Habit>,
    pub focus_sessions: DomainStore<FocusSession>,
    pub transactions: DomainStore<Transaction>,
    pub debts: DomainStore<Debt>,
    pub goals: DomainStore<Goal>,
    pub subscriptions: DomainStore<Subscription>,
    pub investments: DomainStore<Investment>,
}

impl Stores {
    pub fn new(local: &LocalStore, context: &Arc<SyncContext>) -> Self {
        Self {
            tasks: DomainStore::new(local.clone(), Arc::clone(context)),
            lists: DomainStore::new(local.clone(), Arc::clone(context)),
            habits: DomainStore::new(local.clone(), Arc::clone(context)),
            focus_sessions: DomainStore::new(local.clone(), Arc::clone(context)),
            transactions: DomainStore::new(local.clone(), Arc::clone(context)),
            debts: DomainStore::new(local.clone(), Arc::clone(context)),
            goals: DomainStore::new(local.clone(), Arc::clone(context)),
            subscriptions: DomainStore::new(local.clone(), Arc::clone(context)),
            investments: DomainStore::new(local.clone(), Arc::clone(context)),
        }
    }

    /// Hydrate every store from local persistence.
    pub fn load_from_local(&self) {
        let loaded = self.tasks.load_from_local()
            + self.lists.load_from_local()
            + self.habits.load_from_local()
            + self.focus_sessions.load_from_local()
            + self.transactions.load_from_local()
            + self.debts.load_from_local()
            + self.goals.load_from_local()
            + self.subscriptions.load_from_local()
            + self.investments.load_from_local();
        tracing::debug!("Loaded {} local records", loaded);
    }

    /// Full document snapshot of every domain.
    pub fn to_document(&self) -> Result<UserDocument> {
        let mut document = UserDocument::default();
        document.insert_records(&self.tasks.get_all())?;
        document.insert_records(&self.lists.get_all())?;
        document.insert_records(&self.habits.get_all())?;
        document.insert_records(&self.focus_sessions.get_all())?;
        document.insert_records(&self.transactions.get_all())?;
        document.insert_records(&self.debts.get_all())?;
        document.insert_records(&self.goals.get_all())?;
        document.insert_records(&self.subscriptions.get_all())?;
        document.insert_records(&self.investments.get_all())?;
        Ok(document)
    }

    /// Record count per domain, in [`Domain::ALL`] order.
    pub fn counts(&self) -> Vec<(Domain, usize)> {
        Domain::ALL
            .into_iter()
            .map(|domain| (domain, self.len_of(domain)))
            .collect()
    }

    fn len_of(&self, domain: Domain) -> usize {
        match domain {
            Domain::Tasks => self.tasks.len(),
            Domain::Lists => self.lists.len(),
            Domain::Habits => self.habits.len(),
            Domain::FocusSessions => self.focus_sessions.len(),
            Domain::Transactions => self.transactions.len(),
            Domain::Debts => self.debts.len(),
            Domain::Goals => self.goals.len(),
            Domain::Subscriptions => self.subscriptions.len(),
            Domain::Investments => self.investments.len(),
        }
    }
}
