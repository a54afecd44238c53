//! Polling engine.
//!
//! One [`Engine::run_cycle`] call performs a full pass over every tracked
//! entity:
//!
//! 1. **prefetch**: each source kind that batches resolves shared upstream
//!    data for all of its ids, concurrently across kinds;
//! 2. **refresh**: every entity is refreshed concurrently;
//! 3. **diff**: successful refreshes are compared with the ledger one at a
//!    time, so the ledger needs no locking;
//! 4. **dispatch**: changed entities are broadcast to every sink concurrently;
//! 5. **persist**: the ledger is saved once, and only if something changed.
//!
//! Every adapter and sink call runs under a timeout with panics contained, so
//! a single misbehaving entity or sink only ever shows up as a
//! [`CycleFailure`] in the returned [`CycleReport`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use notifier_core::error::{NotifierError, Result};
use notifier_core::ledger::{DiffResult, LedgerStore, VersionLedger};
use notifier_core::models::{EntitySnapshot, Prefetch, TrackedEntity};
use notifier_core::time_utils::UpdateTimeFormat;
use notifier_core::traits::SourceAdapter;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::guard::{guarded, panic_message};
use crate::report::{CycleFailure, CycleReport, FailureStage};

// ── EngineConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Idle time between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Upper bound for any single prefetch, refresh or delivery.
    pub operation_timeout: Duration,
    /// How update timestamps are rendered for sinks.
    pub time_format: UpdateTimeFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(30),
            time_format: UpdateTimeFormat::default(),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct Engine {
    adapters: BTreeMap<&'static str, Arc<dyn SourceAdapter>>,
    entities: Vec<TrackedEntity>,
    ledger: VersionLedger,
    store: Arc<dyn LedgerStore>,
    dispatcher: Dispatcher,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine, loading the ledger from `store`.
    pub fn new(store: Box<dyn LedgerStore>, dispatcher: Dispatcher, config: EngineConfig) -> Self {
        let ledger = store.load();
        tracing::debug!(location = %store.location(), entries = ledger.len(), "ledger ready");
        Self {
            adapters: BTreeMap::new(),
            entities: Vec::new(),
            ledger,
            store: Arc::from(store),
            dispatcher,
            config,
        }
    }

    /// Register the adapter serving one source kind, replacing any previous one.
    pub fn register_adapter(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Start tracking `entity_id` under `source_kind`.
    ///
    /// Returns `Ok(false)` if the pair is already tracked. Fails when no
    /// adapter is registered for the kind.
    pub fn track(&mut self, source_kind: &str, entity_id: &str) -> Result<bool> {
        if !self.adapters.contains_key(source_kind) {
            return Err(NotifierError::Config(format!(
                "no adapter registered for source kind {source_kind}"
            )));
        }
        let duplicate = self
            .entities
            .iter()
            .any(|e| e.source_kind() == source_kind && e.entity_id() == entity_id);
        if duplicate {
            return Ok(false);
        }
        self.entities.push(TrackedEntity::new(source_kind, entity_id));
        Ok(true)
    }

    pub fn entities(&self) -> &[TrackedEntity] {
        &self.entities
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    // ── Cycle ─────────────────────────────────────────────────────────────

    /// Run one full prefetch → refresh → diff → dispatch → persist pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let prefetched = self.prefetch_all(&mut report).await;
        let snapshots = self.refresh_and_diff(&prefetched, &mut report).await;

        let dispatches = join_all(snapshots.iter().map(|s| self.dispatcher.broadcast(s))).await;
        for dispatch in dispatches {
            report.failures.extend(dispatch.failures);
        }

        if !report.changed.is_empty() {
            self.persist(&mut report).await;
        }

        report
    }

    /// Prefetch phase: one guarded call per batching source kind.
    async fn prefetch_all(&self, report: &mut CycleReport) -> HashMap<&'static str, Prefetch> {
        let mut ids_by_kind: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();
        for entity in &self.entities {
            if let Some((kind, adapter)) = self.adapters.get_key_value(entity.source_kind()) {
                if adapter.uses_prefetch() {
                    ids_by_kind
                        .entry(*kind)
                        .or_default()
                        .insert(entity.entity_id().to_string());
                }
            }
        }

        let timeout = self.config.operation_timeout;
        let results = join_all(ids_by_kind.iter().filter_map(|(kind, ids)| {
            let adapter = self.adapters.get(kind)?;
            Some(async move {
                let operation = format!("prefetch {kind}");
                (*kind, guarded(&operation, timeout, adapter.prefetch(ids)).await)
            })
        }))
        .await;

        let mut prefetched = HashMap::new();
        for (kind, result) in results {
            match result {
                Ok(prefetch) => {
                    prefetched.insert(kind, prefetch);
                }
                Err(e) => {
                    tracing::warn!(source = kind, error = %e, "prefetch failed");
                    report
                        .failures
                        .push(CycleFailure::new(FailureStage::Prefetch, kind, e.to_string()));
                }
            }
        }
        prefetched
    }

    /// Refresh every entity concurrently, then diff the successes against the
    /// ledger in tracking order. Returns snapshots of the changed entities.
    async fn refresh_and_diff(
        &mut self,
        prefetched: &HashMap<&'static str, Prefetch>,
        report: &mut CycleReport,
    ) -> Vec<EntitySnapshot> {
        let timeout = self.config.operation_timeout;
        let empty = Prefetch::none();

        let results = join_all(self.entities.iter().map(|entity| {
            let adapter = self.adapters.get(entity.source_kind()).cloned();
            let prefetch = prefetched.get(entity.source_kind()).unwrap_or(&empty);
            async move {
                let Some(adapter) = adapter else {
                    return Err(NotifierError::Config(format!(
                        "no adapter registered for source kind {}",
                        entity.source_kind()
                    )));
                };
                let operation = format!("refresh {}", entity.key());
                guarded(&operation, timeout, adapter.refresh(entity.entity_id(), prefetch)).await
            }
        }))
        .await;

        let mut snapshots = Vec::new();
        for (entity, result) in self.entities.iter_mut().zip(results) {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(entity = %entity.label(), error = %e, "refresh failed");
                    report
                        .failures
                        .push(CycleFailure::refresh(entity.key(), e.to_string()));
                    continue;
                }
            };

            report.refreshed += 1;
            let version = record.version.clone();
            entity.apply(record);

            match self
                .ledger
                .check_and_record(entity.source_kind(), entity.entity_id(), &version)
            {
                DiffResult::Unchanged => {
                    tracing::info!(entity = %entity.label(), version = %version, updated = false, "no update");
                    report.unchanged += 1;
                }
                DiffResult::FirstSeenForSource | DiffResult::FirstSeenForEntity => {
                    report.bootstrapped += 1;
                }
                DiffResult::Changed { previous } => {
                    tracing::info!(
                        entity = %entity.label(),
                        from = %previous,
                        to = %version,
                        updated = true,
                        "update detected"
                    );
                    report.changed.push(entity.key().clone());
                    if let Some(snapshot) = entity.snapshot(&self.config.time_format) {
                        snapshots.push(snapshot);
                    }
                }
            }
        }
        snapshots
    }

    /// Save the whole ledger once, on the blocking pool. A failed save leaves
    /// the in-memory ledger as it is; the next cycle with changes writes
    /// everything.
    async fn persist(&self, report: &mut CycleReport) {
        let store = Arc::clone(&self.store);
        let ledger = self.ledger.clone();
        let saved = match tokio::task::spawn_blocking(move || store.save(&ledger)).await {
            Ok(result) => result,
            // Surfaces at the cycle boundary like any other panic.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(NotifierError::Io(std::io::Error::other(format!(
                "ledger save task failed: {e}"
            )))),
        };

        match saved {
            Ok(()) => {
                tracing::info!(location = %self.store.location(), "ledger saved");
                report.persisted = true;
            }
            Err(e) => {
                tracing::error!(location = %self.store.location(), error = %e, "ledger save failed");
                report.failures.push(CycleFailure::new(
                    FailureStage::Persist,
                    self.store.location(),
                    e.to_string(),
                ));
            }
        }
    }

    // ── Loop ──────────────────────────────────────────────────────────────

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed while idle between cycles; a cycle that
    /// has started always runs to completion.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        tracing::info!(
            entities = self.entities.len(),
            sinks = self.dispatcher.sink_count(),
            interval_secs = self.config.interval.as_secs(),
            "polling started"
        );

        let mut cycle: u64 = 0;
        while !shutdown.is_cancelled() {
            cycle += 1;
            self.run_guarded_cycle(cycle).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!(cycles = cycle, "polling stopped");
    }

    /// One cycle with any panic contained and logged.
    pub async fn run_guarded_cycle(&mut self, cycle: u64) -> CycleReport {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(report) => {
                log_report(cycle, &report);
                report
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(cycle, panic = %message, "cycle aborted");
                CycleReport {
                    failures: vec![CycleFailure::new(FailureStage::Cycle, format!("cycle {cycle}"), message)],
                    ..CycleReport::default()
                }
            }
        }
    }
}

fn log_report(cycle: u64, report: &CycleReport) {
    tracing::info!(
        cycle,
        refreshed = report.refreshed,
        changed = report.changed_count(),
        bootstrapped = report.bootstrapped,
        unchanged = report.unchanged,
        failures = report.failures.len(),
        persisted = report.persisted,
        "cycle complete"
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
