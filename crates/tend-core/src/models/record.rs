//! The shape every synced entity shares, and the domains they live in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One category of user data, persisted and synced as its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    Tasks,
    Lists,
    Habits,
    FocusSessions,
    Transactions,
    Debts,
    Goals,
    Subscriptions,
    Investments,
}

impl Domain {
    /// Every domain, in commit order.
    pub const ALL: [Self; 9] = [
        Self::Tasks,
        Self::Lists,
        Self::Habits,
        Self::FocusSessions,
        Self::Transactions,
        Self::Debts,
        Self::Goals,
        Self::Subscriptions,
        Self::Investments,
    ];

    /// Storage key, shared by the local store and the remote document.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Lists => "lists",
            Self::Habits => "habits",
            Self::FocusSessions => "focusSessions",
            Self::Transactions => "transactions",
            Self::Debts => "debts",
            Self::Goals => "goals",
            Self::Subscriptions => "subscriptions",
            Self::Investments => "investments",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a string does not name a known domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDomain(pub String);

impl fmt::Display for UnknownDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown domain: {}", self.0)
    }
}

impl std::error::Error for UnknownDomain {}

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

/// A record that takes part in last-writer-wins sync.
///
/// The merge engine only looks at `id` and `updated_at`; every other field is
/// opaque to it and travels with the record as a unit.
pub trait SyncRecord:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Domain collection this record type belongs to.
    const DOMAIN: Domain;

    /// Stable identifier, unique within the domain.
    fn id(&self) -> &str;

    /// Time of the last authoritative mutation, if any.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Overwrite the mutation stamp.
    fn set_updated_at(&mut self, stamp: DateTime<Utc>);
}

/// Implements [`SyncRecord`] for a struct with `id` and `updated_at` fields.
macro_rules! impl_sync_record {
    ($record:ty, $domain:expr) => {
        impl $crate::models::SyncRecord for $record {
            const DOMAIN: $crate::models::Domain = $domain;

            fn id(&self) -> &str {
                &self.id
            }

            fn updated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.updated_at
            }

            fn set_updated_at(&mut self, stamp: chrono::DateTime<chrono::Utc>) {
                self.updated_at = Some(stamp);
            }
        }
    };
}

pub(crate) use impl_sync_record;
