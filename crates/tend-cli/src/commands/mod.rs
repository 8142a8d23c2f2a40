pub mod calendar;
pub mod common;
pub mod export;
pub mod habit;
pub mod reconcile;
pub mod spend;
pub mod status;
pub mod task;
