//! Decode, merge and commit a remote document one domain at a time.

use serde::Serialize;

use crate::models::{Domain, SyncConflict, SyncRecord};
use crate::remote::{Decoded, UserDocument};
use crate::store::{DomainStore, Stores};

/// What happened to one domain while applying a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainReport {
    pub domain: Domain,
    pub outcome: DomainOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum DomainOutcome {
    /// The document carries nothing for this domain.
    Absent,
    /// The payload was not a collection; local data left untouched.
    Skipped { reason: String },
    Merged {
        inserted: usize,
        replaced: usize,
        conflicts: Vec<SyncConflict>,
        /// Remote entries that could not be decoded
        dropped_records: usize,
        local_changed: bool,
        /// The remote copy lacks records, or holds older ones, after the merge
        remote_stale: bool,
        /// A write-back of the merged collection was queued
        write_back: bool,
    },
}

impl DomainReport {
    pub const fn changed_local(&self) -> bool {
        matches!(
            self.outcome,
            DomainOutcome::Merged {
                local_changed: true,
                ..
            }
        )
    }

    pub const fn wrote_back(&self) -> bool {
        matches!(
            self.outcome,
            DomainOutcome::Merged {
                write_back: true,
                ..
            }
        )
    }
}

/// Result of handing one document to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(Vec<DomainReport>),
    /// Recognised as this client's own echo and skipped.
    SuppressedEcho,
    /// No session is subscribed; the document was ignored.
    Inactive,
}

impl ApplyOutcome {
    pub fn changed_local(&self) -> bool {
        match self {
            Self::Applied(reports) => reports.iter().any(DomainReport::changed_local),
            Self::SuppressedEcho | Self::Inactive => false,
        }
    }

    pub fn reports(&self) -> &[DomainReport] {
        match self {
            Self::Applied(reports) => reports,
            Self::SuppressedEcho | Self::Inactive => &[],
        }
    }
}

/// Merge `R`'s collection from `document` into `store`.
pub fn reconcile_domain<R: SyncRecord>(
    store: &DomainStore<R>,
    document: &UserDocument,
) -> DomainReport {
    let outcome = match document.decode::<R>() {
        Decoded::Absent => DomainOutcome::Absent,
        Decoded::Malformed(reason) => {
            tracing::warn!("Skipping {} from remote: {}", R::DOMAIN, reason);
            DomainOutcome::Skipped { reason }
        }
        Decoded::Records { records, dropped } => {
            let commit = store.commit_remote(records, dropped);
            if commit.remote_stale && dropped > 0 {
                // Never overwrite entries this client could not read.
                tracing::warn!(
                    "Not writing {} back: {} remote entries were unreadable",
                    R::DOMAIN,
                    dropped
                );
            }
            DomainOutcome::Merged {
                inserted: commit.outcome.stats.inserted,
                replaced: commit.outcome.stats.replaced,
                conflicts: commit.outcome.conflicts,
                dropped_records: dropped,
                local_changed: commit.local_changed,
                remote_stale: commit.remote_stale,
                write_back: commit.write_back,
            }
        }
    };

    DomainReport {
        domain: R::DOMAIN,
        outcome,
    }
}

/// Queue local data for a domain the remote document does not have yet.
fn seed_domain<R: SyncRecord>(store: &DomainStore<R>, document: Option<&UserDocument>) -> bool {
    let absent = document.is_none_or(|document| matches!(document.decode::<R>(), Decoded::Absent));
    absent && store.queue_snapshot()
}

impl Stores {
    /// Apply every domain of `document` independently.
    pub fn reconcile_document(&self, document: &UserDocument) -> Vec<DomainReport> {
        vec![
            reconcile_domain(&self.tasks, document),
            reconcile_domain(&self.lists, document),
            reconcile_domain(&self.habits, document),
            reconcile_domain(&self.focus_sessions, document),
            reconcile_domain(&self.transactions, document),
            reconcile_domain(&self.debts, document),
            reconcile_domain(&self.goals, document),
            reconcile_domain(&self.subscriptions, document),
            reconcile_domain(&self.investments, document),
        ]
    }

    /// Upload local domains missing from the remote document. Returns the
    /// domains that were queued.
    pub fn seed_remote(&self, document: Option<&UserDocument>) -> Vec<Domain> {
        [
            (Domain::Tasks, seed_domain(&self.tasks, document)),
            (Domain::Lists, seed_domain(&self.lists, document)),
            (Domain::Habits, seed_domain(&self.habits, document)),
            (
                Domain::FocusSessions,
                seed_domain(&self.focus_sessions, document),
            ),
            (
                Domain::Transactions,
                seed_domain(&self.transactions, document),
            ),
            (Domain::Debts, seed_domain(&self.debts, document)),
            (Domain::Goals, seed_domain(&self.goals, document)),
            (
                Domain::Subscriptions,
                seed_domain(&self.subscriptions, document),
            ),
            (Domain::Investments, seed_domain(&self.investments, document)),
        ]
        .into_iter()
        .filter_map(|(domain, queued)| queued.then_some(domain))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Habit, Task};
    use crate::storage::LocalStore;
    use crate::sync::{EchoSuppression, SyncContext};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn stores() -> Stores {
        let context = Arc::new(SyncContext::new("client-a", EchoSuppression::default()));
        Stores::new(&LocalStore::in_memory(), &context)
    }

    fn stamped(title: &str, minutes: i64) -> Task {
        let mut task = Task::new(title);
        task.id = format!("id-{title}");
        task.updated_at =
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes));
        task
    }

    #[test]
    fn malformed_domain_is_skipped_while_others_apply() {
        let stores = stores();
        let document: UserDocument = serde_json::from_value(json!({
            "tasks": "definitely not a list",
            "habits": [Habit::new("Stretch", crate::models::Cadence::Daily)]
        }))
        .unwrap();

        let reports = stores.reconcile_document(&document);

        assert!(matches!(
            reports[0].outcome,
            DomainOutcome::Skipped { .. }
        ));
        assert_eq!(reports[1].outcome, DomainOutcome::Absent);
        assert!(reports[2].changed_local());
        assert_eq!(stores.habits.len(), 1);
        assert!(stores.tasks.is_empty());
    }

    #[test]
    fn merged_domain_reports_stats_and_staleness() {
        let stores = stores();
        stores.tasks.replace_all(vec![stamped("local-newer", 10)]);
        let mut remote_older = stamped("local-newer", 0);
        remote_older.title = "stale".to_string();

        let mut document = UserDocument::default();
        document
            .insert_records(&[remote_older, stamped("remote-only", 5)])
            .unwrap();

        let report = reconcile_domain(&stores.tasks, &document);
        match report.outcome {
            DomainOutcome::Merged {
                inserted,
                replaced,
                conflicts,
                local_changed,
                remote_stale,
                write_back,
                ..
            } => {
                assert_eq!((inserted, replaced, conflicts.len()), (1, 0, 1));
                assert!(local_changed);
                assert!(remote_stale);
                // Signed out: nothing to write back to.
                assert!(!write_back);
            }
            other => panic!("expected a merge, got {other:?}"),
        }
        assert_eq!(stores.tasks.get("id-local-newer").unwrap().title, "local-newer");
    }

    #[test]
    fn tied_stamps_with_different_content_are_not_stale() {
        let stores = stores();
        let mut mine = stamped("shared", 0);
        mine.title = "from phone".to_string();
        mine.updated_at = None;
        stores.tasks.replace_all(vec![mine]);

        let mut theirs = stamped("shared", 0);
        theirs.title = "from laptop".to_string();
        theirs.updated_at = None;
        let mut document = UserDocument::default();
        document.insert_records(&[theirs]).unwrap();

        let report = reconcile_domain(&stores.tasks, &document);
        match report.outcome {
            DomainOutcome::Merged {
                conflicts,
                local_changed,
                remote_stale,
                ..
            } => {
                assert_eq!(conflicts.len(), 1);
                assert!(!local_changed);
                assert!(!remote_stale);
            }
            other => panic!("expected a merge, got {other:?}"),
        }
        assert_eq!(stores.tasks.get("id-shared").unwrap().title, "from phone");
    }

    #[test]
    fn identical_document_changes_nothing() {
        let stores = stores();
        let records = vec![stamped("a", 1), stamped("b", 2)];
        stores.tasks.replace_all(records.clone());
        let mut changes = stores.tasks.subscribe();
        changes.borrow_and_update();

        let mut document = UserDocument::default();
        document.insert_records(&records).unwrap();
        let report = reconcile_domain(&stores.tasks, &document);

        assert!(!report.changed_local());
        assert!(!changes.has_changed().unwrap());
        assert_eq!(stores.tasks.get_all(), records);
    }

    #[test]
    fn apply_outcome_helpers() {
        let suppressed = ApplyOutcome::SuppressedEcho;
        assert!(!suppressed.changed_local());
        assert!(suppressed.reports().is_empty());
    }
}
