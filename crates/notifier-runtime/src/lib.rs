//! Polling engine for the game update notifier.
//!
//! Drives the prefetch, refresh, diff, dispatch and persist cycle over the
//! adapters and sinks it is handed, and repeats it on a fixed interval until
//! shut down.

pub mod dispatcher;
mod guard;
pub mod orchestrator;
pub mod report;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use orchestrator::{Engine, EngineConfig};
pub use report::{CycleFailure, CycleReport, FailureStage};
