//! Persisted record of the last version observed per tracked entity.
//!
//! The on-disk shape is a two-level JSON object,
//! `{ "<source kind>": { "<entity id>": "<version>" } }`, stored by default at
//! `~/.game-update-notifier/ledger.json`.
//!
//! An entity seen for the first time (or a source kind seen for the first
//! time) is recorded as a baseline but never reported as an update, so adding
//! a new game or starting with an empty ledger does not flood the sinks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NotifierError, Result};

/// Directory (under `$HOME`) holding the notifier's state.
pub const STATE_DIR_NAME: &str = ".game-update-notifier";

/// Default ledger file name inside [`STATE_DIR_NAME`].
pub const LEDGER_FILE_NAME: &str = "ledger.json";

// ── DiffResult ────────────────────────────────────────────────────────────────

/// Outcome of comparing a freshly observed version with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    /// The source kind had no entry at all; a baseline was recorded.
    FirstSeenForSource,
    /// The source kind was known but this entity was not; a baseline was recorded.
    FirstSeenForEntity,
    /// Stored version equals the observed one.
    Unchanged,
    /// Stored version differed and has been overwritten.
    Changed { previous: String },
}

// ── VersionLedger ─────────────────────────────────────────────────────────────

/// In-memory mapping `source kind → entity id → last seen version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionLedger {
    sources: BTreeMap<String, BTreeMap<String, String>>,
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `version` with the stored value for `(source_kind, entity_id)`
    /// and record it.
    ///
    /// Every outcome except [`DiffResult::Unchanged`] mutates the ledger so it
    /// always reflects the latest successful observation.
    pub fn check_and_record(
        &mut self,
        source_kind: &str,
        entity_id: &str,
        version: &str,
    ) -> DiffResult {
        let Some(entities) = self.sources.get_mut(source_kind) else {
            let mut entities = BTreeMap::new();
            entities.insert(entity_id.to_string(), version.to_string());
            self.sources.insert(source_kind.to_string(), entities);
            tracing::warn!(
                source = source_kind,
                "source kind not found in ledger; recording baseline"
            );
            return DiffResult::FirstSeenForSource;
        };

        match entities.get_mut(entity_id) {
            None => {
                entities.insert(entity_id.to_string(), version.to_string());
                tracing::warn!(
                    source = source_kind,
                    entity = entity_id,
                    "entity not found in ledger; recording baseline"
                );
                DiffResult::FirstSeenForEntity
            }
            Some(stored) if stored.as_str() == version => DiffResult::Unchanged,
            Some(stored) => {
                let previous = std::mem::replace(stored, version.to_string());
                DiffResult::Changed { previous }
            }
        }
    }

    /// Last recorded version, if the pair has ever been observed.
    pub fn get(&self, source_kind: &str, entity_id: &str) -> Option<&str> {
        self.sources
            .get(source_kind)
            .and_then(|m| m.get(entity_id))
            .map(String::as_str)
    }

    /// Number of recorded entities across all source kinds.
    pub fn len(&self) -> usize {
        self.sources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse the persisted JSON form.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Render the persisted JSON form (pretty, keys sorted).
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ── LedgerStore ───────────────────────────────────────────────────────────────

/// Durable storage for a [`VersionLedger`].
pub trait LedgerStore: Send + Sync {
    /// Read the persisted ledger. Never fails: missing or unreadable state is
    /// logged and yields an empty ledger.
    fn load(&self) -> VersionLedger;

    /// Replace the persisted ledger with `ledger`.
    ///
    /// Implementations must not leave previously durable state corrupted if
    /// the process dies part-way through.
    fn save(&self, ledger: &VersionLedger) -> Result<()>;

    /// Where the ledger lives, for log lines.
    fn location(&self) -> String;
}

/// [`LedgerStore`] backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.game-update-notifier/ledger.json`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::home_dir()?
                .join(STATE_DIR_NAME)
                .join(LEDGER_FILE_NAME),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> VersionLedger {
        if !self.path.exists() {
            tracing::warn!(
                path = %self.path.display(),
                "ledger file not found; starting with an empty ledger"
            );
            return VersionLedger::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match VersionLedger::from_json(&content) {
                Ok(ledger) => {
                    tracing::info!(
                        path = %self.path.display(),
                        entities = ledger.len(),
                        "loaded ledger"
                    );
                    ledger
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %self.path.display(),
                        "failed to decode ledger; starting with an empty ledger"
                    );
                    VersionLedger::new()
                }
            },
            Err(source) => {
                let e = NotifierError::FileRead {
                    path: self.path.clone(),
                    source,
                };
                tracing::warn!(error = %e, "starting with an empty ledger");
                VersionLedger::new()
            }
        }
    }

    fn save(&self, ledger: &VersionLedger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_failed(parent))?;
            }
        }

        let json = ledger.to_json_pretty()?;

        // Write to a temp file then rename for atomicity.
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(write_failed(&tmp))?;
        std::fs::rename(&tmp, &self.path).map_err(write_failed(&self.path))?;

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_failed(path: &Path) -> impl FnOnce(std::io::Error) -> NotifierError {
    let path = path.to_path_buf();
    move |source| NotifierError::FileWrite { path, source }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
