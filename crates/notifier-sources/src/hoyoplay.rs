//! HoYoPlay launcher source adapter.
//!
//! Game metadata and package versions come from the launcher's `getGames` /
//! `getGamePackages` endpoints, queried across every launcher region in the
//! prefetch phase and cached for ten minutes. The patch-notes link and update
//! date come from the newest announcement post in `getGameContent`, which is
//! fetched per game on every refresh.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use futures::future::join_all;
use notifier_core::error::{NotifierError, Result};
use notifier_core::models::{GameRecord, Prefetch};
use notifier_core::time_utils::month_day_to_epoch;
use notifier_core::traits::SourceAdapter;
use reqwest::Client;
use serde_json::{json, Value};

use crate::cache::TtlCache;
use crate::http::get_json;

/// Source-kind name for HoYoPlay.
pub const HOYOPLAY_KIND: &str = "HoYoPlay";

/// How long the combined games/packages payload stays fresh.
pub const CATALOG_TTL: Duration = Duration::from_secs(600);

const ANNOUNCEMENT_TYPE: &str = "POST_TYPE_ANNOUNCE";
const CONTENT_LANGUAGE: &str = "eu";

// ── Region ────────────────────────────────────────────────────────────────────

/// One launcher deployment (API host plus launcher id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub api_base: String,
    pub launcher_id: String,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        api_base: impl Into<String>,
        launcher_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            launcher_id: launcher_id.into(),
        }
    }

    pub fn global() -> Self {
        Self::new("global", "https://sg-hyp-api.hoyoverse.com", "VYTpXlbWo8")
    }

    pub fn china() -> Self {
        Self::new("china", "https://hyp-api.mihoyo.com", "jGHBHlcOq1")
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/hyp/hyp-connect/api/{}?launcher_id={}",
            self.api_base, method, self.launcher_id
        )
    }

    /// GET one launcher method and unwrap its `data` envelope.
    ///
    /// A non-zero `retcode` or a null `data` is treated as a failed call.
    async fn call(&self, client: &Client, url: &str) -> Result<Value> {
        let mut body = get_json(client, url).await?;

        let retcode = body.get("retcode").and_then(Value::as_i64);
        if retcode != Some(0) {
            return Err(NotifierError::Payload(format!(
                "{} region answered retcode {:?}: {}",
                self.name,
                retcode,
                body.get("message").and_then(Value::as_str).unwrap_or("")
            )));
        }

        match body.get_mut("data").map(Value::take) {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(NotifierError::Payload(format!(
                "{} region returned no data",
                self.name
            ))),
        }
    }
}

// ── HoYoPlayAdapter ───────────────────────────────────────────────────────────

pub struct HoYoPlayAdapter {
    client: Client,
    regions: Vec<Region>,
    catalog: TtlCache<Value>,
}

impl HoYoPlayAdapter {
    /// Adapter over the global and China launchers.
    pub fn new(client: Client) -> Self {
        Self::with_regions(client, vec![Region::global(), Region::china()])
    }

    pub fn with_regions(client: Client, regions: Vec<Region>) -> Self {
        Self {
            client,
            regions,
            catalog: TtlCache::new(CATALOG_TTL),
        }
    }

    /// Fetch games and packages from one region.
    async fn fetch_region_catalog(&self, region: &Region) -> Result<(Vec<Value>, Vec<Value>)> {
        let games_url = region.endpoint("getGames");
        let packages_url = region.endpoint("getGamePackages");
        let (games, packages) = futures::join!(
            region.call(&self.client, &games_url),
            region.call(&self.client, &packages_url)
        );

        Ok((
            take_array(games?, "games"),
            take_array(packages?, "game_packages"),
        ))
    }

    /// Every post published for `game_id`, across all regions that answered.
    async fn fetch_posts(&self, game_id: &str) -> Vec<Value> {
        let results = join_all(self.regions.iter().map(|region| async move {
            let url = format!(
                "{}&game_id={}&language={}",
                region.endpoint("getGameContent"),
                game_id,
                CONTENT_LANGUAGE
            );
            (region, region.call(&self.client, &url).await)
        }))
        .await;

        let mut posts = Vec::new();
        for (region, result) in results {
            match result {
                Ok(mut content) => {
                    if let Some(Value::Array(found)) =
                        content.pointer_mut("/content/posts").map(Value::take)
                    {
                        posts.extend(found);
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        source = HOYOPLAY_KIND,
                        region = %region.name,
                        entity = game_id,
                        error = %e,
                        "game content unavailable"
                    );
                }
            }
        }
        posts
    }
}

#[async_trait]
impl SourceAdapter for HoYoPlayAdapter {
    fn kind(&self) -> &'static str {
        HOYOPLAY_KIND
    }

    fn uses_prefetch(&self) -> bool {
        true
    }

    async fn prefetch(&self, _ids: &BTreeSet<String>) -> Result<Prefetch> {
        if let Some(catalog) = self.catalog.get() {
            tracing::debug!(source = HOYOPLAY_KIND, "catalog served from cache");
            return Ok(Prefetch::new(catalog));
        }

        let results = join_all(
            self.regions
                .iter()
                .map(|region| async move { (region, self.fetch_region_catalog(region).await) }),
        )
        .await;

        let mut games = Vec::new();
        let mut packages = Vec::new();
        let mut last_error = None;
        for (region, result) in results {
            match result {
                Ok((g, p)) => {
                    games.extend(g);
                    packages.extend(p);
                }
                Err(e) => {
                    tracing::warn!(source = HOYOPLAY_KIND, region = %region.name, error = %e, "catalog unavailable");
                    last_error = Some(e);
                }
            }
        }

        if games.is_empty() && packages.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let complete = last_error.is_none();
        let catalog = json!({ "games": games, "game_packages": packages });
        // Partial catalogs are used for this cycle only.
        if complete {
            self.catalog.put(catalog.clone());
        }

        tracing::debug!(
            source = HOYOPLAY_KIND,
            games = games_len(&catalog),
            complete,
            "catalog prefetched"
        );
        Ok(Prefetch::new(catalog))
    }

    async fn refresh(&self, entity_id: &str, prefetch: &Prefetch) -> Result<GameRecord> {
        let catalog = prefetch.get().ok_or_else(|| {
            NotifierError::Payload("no HoYoPlay catalog was prefetched this cycle".to_string())
        })?;

        let game = find_game(catalog, entity_id)
            .ok_or_else(|| NotifierError::not_found(HOYOPLAY_KIND, entity_id))?;
        let version = find_package_version(catalog, entity_id).ok_or_else(|| {
            NotifierError::Payload(format!("no package version for game {entity_id}"))
        })?;

        let posts = self.fetch_posts(entity_id).await;
        let announcement = latest_announcement(&posts).ok_or_else(|| {
            NotifierError::Payload(format!("no announcement post for game {entity_id}"))
        })?;

        let date = announcement.get("date").and_then(Value::as_str).unwrap_or("");
        let update_timestamp = announcement_epoch(date, Utc::now()).ok_or_else(|| {
            NotifierError::Payload(format!(
                "announcement for game {entity_id} has unreadable date {date:?}"
            ))
        })?;

        Ok(GameRecord {
            display_name: str_at(game, "/display/name").to_string(),
            version,
            update_timestamp,
            image_url: str_at(game, "/display/background/url").to_string(),
            patch_notes_url: announcement
                .get("link")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
    }
}

// ── Catalog lookups ───────────────────────────────────────────────────────────

fn take_array(mut data: Value, field: &str) -> Vec<Value> {
    match data.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn games_len(catalog: &Value) -> usize {
    catalog["games"].as_array().map_or(0, Vec::len)
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn find_game<'a>(catalog: &'a Value, game_id: &str) -> Option<&'a Value> {
    catalog["games"]
        .as_array()?
        .iter()
        .find(|game| game.get("id").and_then(Value::as_str) == Some(game_id))
}

fn find_package_version(catalog: &Value, game_id: &str) -> Option<String> {
    let package = catalog["game_packages"]
        .as_array()?
        .iter()
        .find(|pkg| pkg.pointer("/game/id").and_then(Value::as_str) == Some(game_id))?;

    match package.pointer("/main/major/version")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The last announcement in upstream order.
fn latest_announcement(posts: &[Value]) -> Option<&Value> {
    posts
        .iter()
        .rev()
        .find(|post| post.get("type").and_then(Value::as_str) == Some(ANNOUNCEMENT_TYPE))
}

/// Resolve an announcement's `MM/DD` date to epoch seconds.
///
/// The current year is assumed, unless that puts the date more than a day
/// past `now` (a December post read in January), in which case it is last
/// year's.
fn announcement_epoch(date: &str, now: DateTime<Utc>) -> Option<i64> {
    let this_year = month_day_to_epoch(date, now.year());
    match this_year {
        Some(epoch) if epoch <= now.timestamp() + 86_400 => Some(epoch),
        _ => month_day_to_epoch(date, now.year() - 1).or(this_year),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
