//! Habit model

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::{impl_sync_record, Domain};
use super::timestamp::deserialize_lenient;
use crate::util::new_record_id;

/// How often a habit is expected to be checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Daily,
    Weekly,
}

/// A recurring habit with its check-in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cadence: Cadence,
    /// Check-in count per calendar day
    #[serde(default)]
    pub history: BTreeMap<NaiveDate, u32>,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Habit, Domain::Habits);

impl Habit {
    #[must_use]
    pub fn new(name: impl Into<String>, cadence: Cadence) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            name: name.into(),
            cadence,
            history: BTreeMap::new(),
            is_archived: false,
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Record one check-in on `day`.
    pub fn check_in(&mut self, day: NaiveDate) {
        *self.history.entry(day).or_insert(0) += 1;
    }

    /// Whether the habit was checked in on `day`.
    #[must_use]
    pub fn is_done_on(&self, day: NaiveDate) -> bool {
        self.history.get(&day).is_some_and(|count| *count > 0)
    }

    /// Consecutive periods, ending at `today`, with at least one check-in.
    ///
    /// For weekly habits a period is an ISO week. The current period counts
    /// only once it has a check-in; an empty current period does not break
    /// the streak.
    #[must_use]
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let period_of = |day: NaiveDate| -> i64 {
            match self.cadence {
                Cadence::Daily => i64::from(day.num_days_from_ce()),
                Cadence::Weekly => {
                    let monday =
                        day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
                    i64::from(monday.num_days_from_ce()).div_euclid(7)
                }
            }
        };

        let mut periods: Vec<i64> = self
            .history
            .iter()
            .filter(|(day, count)| **count > 0 && **day <= today)
            .map(|(day, _)| period_of(*day))
            .collect();
        periods.dedup();

        let current = period_of(today);
        let mut expected = current;
        let mut streak = 0;
        for period in periods.into_iter().rev() {
            if period == expected {
                streak += 1;
                expected -= 1;
            } else if period == current - 1 && streak == 0 {
                streak = 1;
                expected = period - 1;
            } else {
                break;
            }
        }
        streak
    }
}
