//! tend-core - Core library for Tend
//!
//! This crate contains the syncable record models, the local key/value
//! persistence layer, the last-writer-wins merge engine, and the session
//! orchestrator that keeps local domain stores in step with a remote per-user
//! document.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod remote;
pub mod state;
pub mod storage;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Domain, SyncRecord};
pub use store::{DomainStore, Stores};
