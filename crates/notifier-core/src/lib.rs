//! Core types for the game update notifier.
//!
//! Holds the data model, the version ledger, the adapter/sink capability
//! traits, settings and time formatting. Nothing in this crate performs
//! network I/O.

pub mod error;
pub mod ledger;
pub mod models;
pub mod settings;
pub mod time_utils;
pub mod traits;

pub use error::{NotifierError, Result};
pub use ledger::{DiffResult, JsonFileStore, LedgerStore, VersionLedger};
pub use models::{EntityKey, EntitySnapshot, GameRecord, Prefetch, TrackedEntity};
pub use traits::{NotificationSink, SourceAdapter};
