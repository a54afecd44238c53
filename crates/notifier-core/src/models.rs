//! Tracked entities, their refreshed records and the snapshots sent to sinks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::time_utils::UpdateTimeFormat;

/// Descriptive fields produced by one successful adapter refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Human-readable game title.
    pub display_name: String,
    /// Opaque version string; only ever compared for equality.
    pub version: String,
    /// Unix epoch seconds of the upstream update.
    pub update_timestamp: i64,
    /// Cover / header image.
    pub image_url: String,
    /// Link to the patch notes, empty when the source has none.
    #[serde(default)]
    pub patch_notes_url: String,
}

/// Stable `(source kind, entity id)` pair used as the ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub source_kind: String,
    pub entity_id: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_kind, self.entity_id)
    }
}

/// One thing being watched, e.g. one game on one platform.
///
/// The identity is fixed at construction; the descriptive record is replaced
/// on every successful refresh and left untouched when a refresh fails.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    key: EntityKey,
    record: Option<GameRecord>,
}

impl TrackedEntity {
    pub fn new(source_kind: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            key: EntityKey {
                source_kind: source_kind.into(),
                entity_id: entity_id.into(),
            },
            record: None,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn source_kind(&self) -> &str {
        &self.key.source_kind
    }

    pub fn entity_id(&self) -> &str {
        &self.key.entity_id
    }

    /// Replace the descriptive fields after a successful refresh.
    pub fn apply(&mut self, record: GameRecord) {
        self.record = Some(record);
    }

    /// Short label for log lines: `[Steam] Counter-Strike 2`, or the raw id
    /// when the entity has never been refreshed.
    pub fn label(&self) -> String {
        match &self.record {
            Some(r) if !r.display_name.is_empty() => {
                format!("[{}] {}", self.key.source_kind, r.display_name)
            }
            _ => format!("[{}] {}", self.key.source_kind, self.key.entity_id),
        }
    }

    /// Freeze the current fields into the value handed to sinks.
    ///
    /// Returns `None` until the entity has been refreshed at least once.
    pub fn snapshot(&self, time_format: &UpdateTimeFormat) -> Option<EntitySnapshot> {
        let record = self.record.as_ref()?;
        Some(EntitySnapshot {
            platform: self.key.source_kind.clone(),
            display_name: record.display_name.clone(),
            unique_id: self.key.entity_id.clone(),
            version: record.version.clone(),
            update_time: time_format.format_epoch(record.update_timestamp),
            update_timestamp: record.update_timestamp,
            image_url: record.image_url.clone(),
            patch_notes_url: record.patch_notes_url.clone(),
        })
    }
}

/// Immutable view of a changed entity delivered to every sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Source kind, e.g. `"Steam"`.
    pub platform: String,
    pub display_name: String,
    pub unique_id: String,
    pub version: String,
    /// Update time already rendered for humans.
    pub update_time: String,
    pub update_timestamp: i64,
    pub image_url: String,
    /// May be empty.
    pub patch_notes_url: String,
}

impl EntitySnapshot {
    pub fn has_patch_notes(&self) -> bool {
        !self.patch_notes_url.is_empty()
    }
}

// ── Prefetch ──────────────────────────────────────────────────────────────────

/// Shared upstream data fetched once per cycle for a whole source kind and
/// threaded into each entity's refresh.
///
/// Cloning is cheap; the payload is reference counted.
#[derive(Debug, Clone, Default)]
pub struct Prefetch(Option<Arc<serde_json::Value>>);

impl Prefetch {
    /// No shared data (the adapter does not batch, or the batch failed).
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(value: serde_json::Value) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn get(&self) -> Option<&serde_json::Value> {
        self.0.as_deref()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
