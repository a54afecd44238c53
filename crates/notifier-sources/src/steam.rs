//! Steam source adapter.
//!
//! Build ids come from Steam's PICS product info, read through a JSON mirror
//! (`https://api.steamcmd.net/v1/info/{appid}` by default). Product info for
//! every tracked app is resolved in the prefetch phase; each refresh then only
//! reads its own app out of that batch.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::join_all;
use notifier_core::error::{NotifierError, Result};
use notifier_core::models::{GameRecord, Prefetch};
use notifier_core::traits::SourceAdapter;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::http::{as_u64, get_json};

/// Source-kind name for Steam.
pub const STEAM_KIND: &str = "Steam";

/// Default product-info endpoint; the app id is appended as a path segment.
pub const DEFAULT_STEAM_INFO_URL: &str = "https://api.steamcmd.net/v1/info";

const HEADER_IMAGE_BASE: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps";
const PATCH_NOTES_BASE: &str = "https://steamdb.info/patchnotes";

// ── SteamAdapter ──────────────────────────────────────────────────────────────

pub struct SteamAdapter {
    client: Client,
    info_url: String,
}

impl SteamAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_info_url(client, DEFAULT_STEAM_INFO_URL)
    }

    /// Point the adapter at a different product-info endpoint.
    pub fn with_info_url(client: Client, info_url: impl Into<String>) -> Self {
        Self {
            client,
            info_url: info_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch product info for one app.
    async fn fetch_app(&self, app_id: &str) -> Result<Value> {
        let url = format!("{}/{}", self.info_url, app_id);
        let mut body = get_json(&self.client, &url).await?;

        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Err(NotifierError::Payload(format!(
                "product info for app {app_id} has status {}",
                body.get("status").unwrap_or(&Value::Null)
            )));
        }

        body.get_mut("data")
            .and_then(|data| data.get_mut(app_id))
            .map(Value::take)
            .ok_or_else(|| NotifierError::not_found(STEAM_KIND, app_id))
    }
}

#[async_trait]
impl SourceAdapter for SteamAdapter {
    fn kind(&self) -> &'static str {
        STEAM_KIND
    }

    fn uses_prefetch(&self) -> bool {
        true
    }

    async fn prefetch(&self, ids: &BTreeSet<String>) -> Result<Prefetch> {
        let results = join_all(ids.iter().map(|id| async move {
            let result = self.fetch_app(id).await;
            (id, result)
        }))
        .await;

        let mut apps = Map::new();
        let mut last_error = None;
        for (id, result) in results {
            match result {
                Ok(app) => {
                    apps.insert(id.clone(), app);
                }
                Err(e) => {
                    tracing::warn!(source = STEAM_KIND, entity = %id, error = %e, "product info unavailable");
                    last_error = Some(e);
                }
            }
        }

        // Only a total wipe-out fails the batch; partial gaps fail their own refresh.
        if apps.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        tracing::debug!(source = STEAM_KIND, apps = apps.len(), "product info prefetched");
        Ok(Prefetch::new(Value::Object(apps)))
    }

    async fn refresh(&self, entity_id: &str, prefetch: &Prefetch) -> Result<GameRecord> {
        let apps = prefetch.get().ok_or_else(|| {
            NotifierError::Payload("no Steam product info was prefetched this cycle".to_string())
        })?;
        let app = apps
            .get(entity_id)
            .ok_or_else(|| NotifierError::not_found(STEAM_KIND, entity_id))?;

        parse_app(entity_id, app)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Turn one app's product info into a [`GameRecord`].
///
/// The public branch build id is the version; it must be a positive integer.
fn parse_app(app_id: &str, app: &Value) -> Result<GameRecord> {
    let name = app
        .pointer("/common/name")
        .and_then(Value::as_str)
        .ok_or_else(|| NotifierError::Payload(format!("app {app_id} has no common.name")))?;

    let public = app.pointer("/depots/branches/public").ok_or_else(|| {
        NotifierError::Payload(format!("app {app_id} has no public branch"))
    })?;

    let build_id = public
        .get("buildid")
        .and_then(as_u64)
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            NotifierError::Payload(format!("app {app_id} has no positive public build id"))
        })?;

    let time_updated = public
        .get("timeupdated")
        .and_then(as_u64)
        .ok_or_else(|| {
            NotifierError::Payload(format!("app {app_id} has no public update time"))
        })?;

    Ok(GameRecord {
        display_name: name.to_string(),
        version: build_id.to_string(),
        update_timestamp: i64::try_from(time_updated).unwrap_or(i64::MAX),
        image_url: header_image_url(app_id),
        patch_notes_url: patch_notes_url(build_id),
    })
}

pub fn header_image_url(app_id: &str) -> String {
    format!("{HEADER_IMAGE_BASE}/{app_id}/header.jpg")
}

/// SteamDB patch notes for a build; empty for build id 0.
pub fn patch_notes_url(build_id: u64) -> String {
    if build_id > 0 {
        format!("{PATCH_NOTES_BASE}/{build_id}")
    } else {
        String::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
