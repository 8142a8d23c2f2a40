//! Data models for Tend

mod finance;
mod focus;
mod habit;
mod preferences;
mod record;
mod sync_conflict;
mod task;
pub mod timestamp;

pub use finance::{
    BillingCycle, Debt, DebtDirection, Goal, Investment, Subscription, Transaction,
    TransactionKind,
};
pub use focus::FocusSession;
pub use habit::{Cadence, Habit};
pub use preferences::{Preferences, ThemeMode};
pub use record::{Domain, SyncRecord, UnknownDomain};
pub use sync_conflict::{ConflictWinner, SyncConflict};
pub use task::{Priority, Task, TaskList};
