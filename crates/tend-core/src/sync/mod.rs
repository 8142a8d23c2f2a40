//! Session lifecycle and remote reconciliation.
//!
//! The [`SyncOrchestrator`] owns the session: it hydrates the domain stores
//! from the remote document, keeps a live subscription open, commits every
//! pushed document through the per-domain merge, and drains queued local
//! writes to the remote store in the background.

mod apply;
mod context;
mod orchestrator;

pub use apply::{reconcile_domain, ApplyOutcome, DomainOutcome, DomainReport};
pub use context::{EchoSuppression, SyncContext};
pub use orchestrator::SyncOrchestrator;
