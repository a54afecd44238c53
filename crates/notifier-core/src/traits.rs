//! Capability seams between the engine and its collaborators.
//!
//! Adapters and sinks are chosen at configuration time and held by the engine
//! as `Arc<dyn …>`; the engine only ever talks to them through these traits.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{EntitySnapshot, GameRecord, Prefetch};

/// One source kind (a storefront or launcher API).
///
/// A single adapter instance serves every tracked entity of its kind and owns
/// whatever long-lived network client that kind needs.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source-kind name used in the ledger and in notifications.
    fn kind(&self) -> &'static str;

    /// Whether [`SourceAdapter::prefetch`] does real work for this kind.
    ///
    /// The engine skips the prefetch phase for kinds that return `false`.
    fn uses_prefetch(&self) -> bool {
        false
    }

    /// Resolve shared upstream data for every tracked id of this kind in one
    /// go. Called once per cycle, before any refresh.
    async fn prefetch(&self, _ids: &BTreeSet<String>) -> Result<Prefetch> {
        Ok(Prefetch::none())
    }

    /// Fetch the current state of one entity.
    ///
    /// `prefetch` is whatever this cycle's [`SourceAdapter::prefetch`]
    /// returned, or [`Prefetch::none`] when it failed or was skipped.
    async fn refresh(&self, entity_id: &str, prefetch: &Prefetch) -> Result<GameRecord>;
}

/// A notification delivery target.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name for logs, e.g. `"telegram"`.
    fn name(&self) -> &str;

    /// Deliver one changed entity. Best effort; the engine never retries.
    async fn deliver(&self, snapshot: &EntitySnapshot) -> Result<()>;
}
