//! The per-user remote document and its typed decode step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Domain, SyncRecord};

/// Tag identifying which client wrote the current document revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOrigin {
    pub client_id: String,
    pub revision: u64,
}

/// A user's remote document: domain key -> collection payload.
///
/// Payloads stay loosely typed here; [`UserDocument::decode`] is the only way
/// they reach the merge engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_origin", default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<WriteOrigin>,
    #[serde(flatten)]
    pub domains: BTreeMap<String, Value>,
}

/// Result of decoding one domain out of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<R> {
    /// The document has no entry for this domain.
    Absent,
    /// The entry exists but is not a collection.
    Malformed(String),
    /// Records that decoded; `dropped` counts entries that did not.
    Records { records: Vec<R>, dropped: usize },
}

impl UserDocument {
    /// Partial document carrying a single domain collection.
    pub fn with_domain(domain: Domain, payload: Value) -> Self {
        let mut document = Self::default();
        document.domains.insert(domain.key().to_string(), payload);
        document
    }

    /// Encode `records` into the document under their domain key.
    pub fn insert_records<R: SyncRecord>(&mut self, records: &[R]) -> serde_json::Result<()> {
        let payload = serde_json::to_value(records)?;
        self.domains.insert(R::DOMAIN.key().to_string(), payload);
        Ok(())
    }

    #[must_use]
    pub fn with_origin(mut self, origin: WriteOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// True when no domain carries any data.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domain(&self, domain: Domain) -> Option<&Value> {
        self.domains.get(domain.key())
    }

    /// Merge-write `partial` into this document: domains present in the
    /// partial replace ours, everything else is left untouched.
    pub fn apply_partial(&mut self, partial: Self) {
        if partial.origin.is_some() {
            self.origin = partial.origin;
        }
        self.domains.extend(partial.domains);
    }

    /// Decode the collection for `R`'s domain.
    ///
    /// `null` is treated as an absent domain. Individual entries that fail to
    /// decode are dropped and counted rather than failing the domain.
    pub fn decode<R: SyncRecord>(&self) -> Decoded<R> {
        let Some(payload) = self.domain(R::DOMAIN) else {
            return Decoded::Absent;
        };

        let entries = match payload {
            Value::Null => return Decoded::Absent,
            Value::Array(entries) => entries,
            other => {
                return Decoded::Malformed(format!(
                    "expected an array for {}, found {}",
                    R::DOMAIN,
                    value_kind(other)
                ));
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        let mut dropped = 0;
        for entry in entries {
            match R::deserialize(entry) {
                Ok(record) => records.push(record),
                Err(error) => {
                    dropped += 1;
                    tracing::warn!("Dropping undecodable {} record: {}", R::DOMAIN, error);
                }
            }
        }

        Decoded::Records { records, dropped }
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
