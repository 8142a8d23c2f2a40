//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::Domain;

/// Which side of a conflict survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictWinner {
    Local,
    Remote,
}

/// Sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Domain the record belongs to
    pub domain: Domain,
    /// Record involved in the conflict
    pub record_id: String,
    /// Existing record's timestamp when the conflict occurred (unix ms, 0 if unset)
    pub local_updated_at: i64,
    /// Incoming record's timestamp (unix ms, 0 if unset)
    pub incoming_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
    pub winner: ConflictWinner,
}
