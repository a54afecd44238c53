//! Per-cycle outcome accounting.

use std::fmt;

use notifier_core::models::EntityKey;

/// Where in the cycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Prefetch,
    Refresh,
    Delivery,
    Persist,
    /// The cycle as a whole aborted (panic caught at the loop boundary).
    Cycle,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Prefetch => "prefetch",
            FailureStage::Refresh => "refresh",
            FailureStage::Delivery => "delivery",
            FailureStage::Persist => "persist",
            FailureStage::Cycle => "cycle",
        };
        f.write_str(s)
    }
}

/// One contained failure. Never escapes the cycle; only reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleFailure {
    pub stage: FailureStage,
    /// What failed: an entity key, a source kind, a sink name or a ledger path.
    pub subject: String,
    pub message: String,
}

impl CycleFailure {
    pub fn new(stage: FailureStage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn refresh(key: &EntityKey, message: impl Into<String>) -> Self {
        Self::new(FailureStage::Refresh, key.to_string(), message)
    }
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.subject, self.message)
    }
}

/// Summary of one orchestration cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entities whose refresh succeeded.
    pub refreshed: usize,
    /// Entities whose version differed from the ledger.
    pub changed: Vec<EntityKey>,
    /// Entities recorded for the first time.
    pub bootstrapped: usize,
    pub unchanged: usize,
    pub failures: Vec<CycleFailure>,
    /// Whether the ledger was written successfully this cycle.
    pub persisted: bool,
}

impl CycleReport {
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }

    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &CycleFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
