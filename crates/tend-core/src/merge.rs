//! Last-writer-wins reconciliation of one domain collection.
//!
//! Local records seed the result; a remote record replaces the local record
//! with the same id only when its `updatedAt` is strictly later. Missing or
//! malformed stamps compare as the epoch, so ties (including two missing
//! stamps) keep the local copy. Records are replaced whole; there is no
//! field-level merge.

use std::collections::HashMap;

use crate::models::timestamp::stamp_millis;
use crate::models::{ConflictWinner, SyncConflict, SyncRecord};

/// Strategy name recorded on every resolved conflict.
pub const STRATEGY_LWW: &str = "lww";

/// Reconciled collection plus what happened while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<R> {
    /// One record per distinct id: local order first, then remote-only records.
    pub records: Vec<R>,
    pub stats: MergeStats,
    /// Ids present on both sides with differing content.
    pub conflicts: Vec<SyncConflict>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Remote records with no local counterpart
    pub inserted: usize,
    /// Local records replaced by a strictly newer remote record
    pub replaced: usize,
}

/// Merge `remote` into `local` and return the reconciled collection.
pub fn merge<R: SyncRecord>(local: Vec<R>, remote: Vec<R>) -> Vec<R> {
    reconcile(local, remote).records
}

/// Merge `remote` into `local`, reporting inserts, replacements and conflicts.
pub fn reconcile<R: SyncRecord>(local: Vec<R>, remote: Vec<R>) -> MergeOutcome<R> {
    let mut records: Vec<R> = Vec::with_capacity(local.len() + remote.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.capacity());

    // Duplicate local ids collapse with the same strictly-newer rule.
    for record in local {
        if let Some(&slot) = index.get(record.id()) {
            if is_strictly_newer(&record, &records[slot]) {
                records[slot] = record;
            }
        } else {
            index.insert(record.id().to_string(), records.len());
            records.push(record);
        }
    }

    let resolved_at = chrono::Utc::now().timestamp_millis();
    let mut stats = MergeStats::default();
    let mut conflicts = Vec::new();

    for incoming in remote {
        let Some(&slot) = index.get(incoming.id()) else {
            index.insert(incoming.id().to_string(), records.len());
            records.push(incoming);
            stats.inserted += 1;
            continue;
        };

        let existing = &records[slot];
        if *existing == incoming {
            continue;
        }

        let remote_wins = is_strictly_newer(&incoming, existing);
        conflicts.push(SyncConflict {
            domain: R::DOMAIN,
            record_id: incoming.id().to_string(),
            local_updated_at: stamp_millis(existing.updated_at()),
            incoming_updated_at: stamp_millis(incoming.updated_at()),
            resolved_at,
            strategy: STRATEGY_LWW.to_string(),
            winner: if remote_wins {
                ConflictWinner::Remote
            } else {
                ConflictWinner::Local
            },
        });

        if remote_wins {
            records[slot] = incoming;
            stats.replaced += 1;
        }
    }

    tracing::debug!(
        "Merged {}: {} records, {} inserted, {} replaced, {} conflicts",
        R::DOMAIN,
        records.len(),
        stats.inserted,
        stats.replaced,
        conflicts.len()
    );

    MergeOutcome {
        records,
        stats,
        conflicts,
    }
}

fn is_strictly_newer<R: SyncRecord>(candidate: &R, current: &R) -> bool {
    stamp_millis(candidate.updated_at()) > stamp_millis(current.updated_at())
}

/// True when `merged` holds something `remote` lacks: an id it does not
/// carry, or a copy stamped strictly later than the remote one. Equal stamps
/// never count, even with different content, since both sides keep their own
/// copy on a tie.
pub fn is_ahead_of<R: SyncRecord>(merged: &[R], remote: &[R]) -> bool {
    let mut remote_stamps: HashMap<&str, i64> = HashMap::with_capacity(remote.len());
    for record in remote {
        let stamp = stamp_millis(record.updated_at());
        remote_stamps
            .entry(record.id())
            .and_modify(|current| *current = (*current).max(stamp))
            .or_insert(stamp);
    }
    merged.iter().any(|record| {
        remote_stamps
            .get(record.id())
            .is_none_or(|remote_stamp| stamp_millis(record.updated_at()) > *remote_stamp)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn task(id: &str, title: &str, updated_at: Option<DateTime<Utc>>) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            notes: None,
            list_id: None,
            due_at: None,
            completed: false,
            completed_at: None,
            priority: crate::models::Priority::Normal,
            external_id: None,
            is_deleted: false,
            created_at: t0(),
            updated_at,
        }
    }

    fn titles(records: &[Task]) -> Vec<(&str, &str)> {
        records
            .iter()
            .map(|record| (record.id.as_str(), record.title.as_str()))
            .collect()
    }

    #[test]
    fn newer_remote_replaces_local() {
        let t1 = t0() + Duration::minutes(5);
        let merged = merge(
            vec![task("t1", "Buy milk", Some(t0()))],
            vec![task("t1", "Buy milk and eggs", Some(t1))],
        );
        assert_eq!(titles(&merged), vec![("t1", "Buy milk and eggs")]);
    }

    #[test]
    fn older_remote_keeps_local() {
        let earlier = t0() - Duration::minutes(5);
        let merged = merge(
            vec![task("t1", "Buy milk", Some(t0()))],
            vec![task("t1", "Buy milk and eggs", Some(earlier))],
        );
        assert_eq!(titles(&merged), vec![("t1", "Buy milk")]);
    }

    #[test]
    fn remote_only_records_are_always_included() {
        let merged = merge(
            vec![task("t1", "Buy milk", Some(t0()))],
            vec![task("t2", "Ancient", None)],
        );
        assert_eq!(titles(&merged), vec![("t1", "Buy milk"), ("t2", "Ancient")]);
    }

    #[test]
    fn equal_stamps_keep_local() {
        let merged = merge(
            vec![task("t1", "local", Some(t0()))],
            vec![task("t1", "remote", Some(t0()))],
        );
        assert_eq!(titles(&merged), vec![("t1", "local")]);
    }

    #[test]
    fn missing_stamp_loses_to_any_stamp() {
        let epoch = DateTime::from_timestamp_millis(1).unwrap();
        let merged = merge(
            vec![task("t1", "local", None)],
            vec![task("t1", "remote", Some(epoch))],
        );
        assert_eq!(titles(&merged), vec![("t1", "remote")]);

        let merged = merge(
            vec![task("t1", "local", Some(epoch))],
            vec![task("t1", "remote", None)],
        );
        assert_eq!(titles(&merged), vec![("t1", "local")]);
    }

    #[test]
    fn two_missing_stamps_tie_to_whichever_side_is_local() {
        let a = task("t1", "a", None);
        let b = task("t1", "b", None);
        assert_eq!(
            titles(&merge(vec![a.clone()], vec![b.clone()])),
            vec![("t1", "a")]
        );
        assert_eq!(titles(&merge(vec![b], vec![a])), vec![("t1", "b")]);
    }

    #[test]
    fn empty_inputs_are_identities() {
        let records = vec![task("t1", "x", Some(t0())), task("t2", "y", None)];
        assert_eq!(merge(records.clone(), Vec::new()), records);
        assert_eq!(merge(Vec::new(), records.clone()), records);
        assert!(merge::<Task>(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn every_id_appears_exactly_once() {
        let local = vec![
            task("a", "1", Some(t0())),
            task("b", "2", None),
            task("a", "1-dup", Some(t0() + Duration::seconds(1))),
        ];
        let remote = vec![
            task("b", "2-remote", Some(t0())),
            task("c", "3", None),
            task("c", "3-dup", Some(t0())),
        ];

        let merged = merge(local, remote);
        let mut ids: Vec<&str> = merged.iter().map(|record| record.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            titles(&merged),
            vec![("a", "1-dup"), ("b", "2-remote"), ("c", "3-dup")]
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let local = vec![
            task("t1", "local newer", Some(t0() + Duration::hours(1))),
            task("t2", "local older", Some(t0())),
            task("t3", "local only", None),
        ];
        let remote = vec![
            task("t1", "remote older", Some(t0())),
            task("t2", "remote newer", Some(t0() + Duration::hours(2))),
            task("t4", "remote only", None),
        ];

        let once = merge(local, remote.clone());
        let twice = merge(once.clone(), remote);
        assert_eq!(twice, once);
    }

    #[test]
    fn reconcile_reports_stats_and_conflicts() {
        let outcome = reconcile(
            vec![
                task("t1", "keep", Some(t0() + Duration::hours(1))),
                task("t2", "lose", Some(t0())),
                task("t3", "same", Some(t0())),
            ],
            vec![
                task("t1", "stale", Some(t0())),
                task("t2", "win", Some(t0() + Duration::hours(1))),
                task("t3", "same", Some(t0())),
                task("t4", "new", None),
            ],
        );

        assert_eq!(
            outcome.stats,
            MergeStats {
                inserted: 1,
                replaced: 1
            }
        );
        let winners: Vec<(&str, ConflictWinner)> = outcome
            .conflicts
            .iter()
            .map(|conflict| (conflict.record_id.as_str(), conflict.winner))
            .collect();
        assert_eq!(
            winners,
            vec![("t1", ConflictWinner::Local), ("t2", ConflictWinner::Remote)]
        );
        assert!(outcome
            .conflicts
            .iter()
            .all(|conflict| conflict.strategy == STRATEGY_LWW));
    }

    #[test]
    fn ahead_only_for_missing_ids_or_newer_stamps() {
        let a = task("a", "1", Some(t0()));
        let b = task("b", "2", None);
        assert!(!is_ahead_of(
            &[a.clone(), b.clone()],
            &[b.clone(), a.clone()]
        ));
        assert!(is_ahead_of(&[a.clone(), b.clone()], &[a.clone()]));
        assert!(!is_ahead_of(&[a.clone()], &[a.clone(), b]));

        let newer = task("a", "1", Some(t0() + Duration::seconds(1)));
        assert!(is_ahead_of(&[newer], &[a]));
    }

    #[test]
    fn tied_stamps_with_different_content_are_not_ahead() {
        assert!(!is_ahead_of(
            &[task("t1", "from phone", None)],
            &[task("t1", "from laptop", None)]
        ));
        assert!(!is_ahead_of(
            &[task("t1", "from phone", Some(t0()))],
            &[task("t1", "from laptop", Some(t0()))]
        ));
    }
}
