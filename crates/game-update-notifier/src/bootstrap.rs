use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use notifier_core::ledger::{JsonFileStore, STATE_DIR_NAME};
use notifier_core::settings::Settings;
use notifier_core::traits::NotificationSink;
use notifier_runtime::{Dispatcher, Engine, EngineConfig};
use notifier_sinks::{DiscordSink, TelegramSink};
use notifier_sources::{build_client, HoYoPlayAdapter, SteamAdapter, HOYOPLAY_KIND, STEAM_KIND};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.game-update-notifier/` and the ledger's parent directory exist.
pub fn ensure_directories(ledger_path: &Path) -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let state_dir = home.join(STATE_DIR_NAME);
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("cannot create {}", state_dir.display()))?;

    if let Some(parent) = ledger_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to a `tracing` level directive.
fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber. `RUST_LOG`, when set, wins
/// over `log_level`.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}

// ── Wiring ─────────────────────────────────────────────────────────────────────

/// Sinks enabled by the current credentials.
fn build_sinks(settings: &Settings) -> anyhow::Result<Vec<Arc<dyn NotificationSink>>> {
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();

    if let Some((token, chat_id)) = settings.telegram_credentials() {
        let client = build_client(settings.operation_timeout())?;
        sinks.push(Arc::new(TelegramSink::new(
            client,
            &settings.telegram_api_base,
            token,
            chat_id,
        )));
    }

    if let Some(webhook_url) = settings.discord_webhook() {
        let client = build_client(settings.operation_timeout())?;
        sinks.push(Arc::new(DiscordSink::new(client, webhook_url)));
    }

    Ok(sinks)
}

/// Assemble the engine: ledger store, sinks, adapters and tracked games.
pub fn build_engine(settings: &Settings) -> anyhow::Result<Engine> {
    let config = EngineConfig {
        interval: settings.interval(),
        operation_timeout: settings.operation_timeout(),
        time_format: settings.update_time_format(),
    };

    let sinks = build_sinks(settings)?;
    let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
    tracing::info!(sinks = ?names, "notification sinks configured");

    let dispatcher = Dispatcher::new(sinks, config.operation_timeout);
    let store = JsonFileStore::new(settings.resolved_ledger_path());
    let mut engine = Engine::new(Box::new(store), dispatcher, config);

    let steam_ids = settings.steam_id_list();
    if !steam_ids.is_empty() {
        let client = build_client(settings.operation_timeout())?;
        engine.register_adapter(Arc::new(SteamAdapter::new(client)));
        for id in &steam_ids {
            engine.track(STEAM_KIND, id)?;
        }
    }

    let hoyoplay_ids = settings.hoyoplay_id_list();
    if !hoyoplay_ids.is_empty() {
        let client = build_client(settings.operation_timeout())?;
        engine.register_adapter(Arc::new(HoYoPlayAdapter::new(client)));
        for id in &hoyoplay_ids {
            engine.track(HOYOPLAY_KIND, id)?;
        }
    }

    tracing::info!(
        steam = steam_ids.len(),
        hoyoplay = hoyoplay_ids.len(),
        "tracking games"
    );
    Ok(engine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(extra: &[&str]) -> Settings {
        let mut args = vec!["game-update-notifier"];
        args.extend_from_slice(extra);
        Settings::try_load_from(args).expect("valid arguments")
    }

    // ── level_directive ──────────────────────────────────────────────────────

    #[test]
    fn test_level_directive_mapping() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("error"), "error");
        assert_eq!(level_directive("bogus"), "info");
    }

    // ── ensure_directories ───────────────────────────────────────────────────

    #[test]
    fn test_ensure_directories_creates_state_and_ledger_parent() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let ledger = tmp.path().join("data").join("nested").join("ledger.json");
        let result = ensure_directories(&ledger);

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");
        assert!(tmp.path().join(".game-update-notifier").is_dir());
        assert!(tmp.path().join("data").join("nested").is_dir());
        assert!(!ledger.exists());
    }

    // ── build_engine ─────────────────────────────────────────────────────────

    #[test]
    fn test_build_engine_tracks_configured_games() {
        let tmp = TempDir::new().expect("tempdir");
        let ledger = tmp.path().join("ledger.json");
        let settings = settings(&[
            "--discord-webhook-url",
            "http://127.0.0.1:9/webhook",
            "--steam-ids",
            "730, 570,730",
            "--hoyoplay-ids",
            "gopR6Cufr3",
            "--ledger-path",
            ledger.to_str().unwrap(),
        ]);

        let engine = build_engine(&settings).expect("engine");
        let tracked: Vec<String> = engine
            .entities()
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        assert_eq!(
            tracked,
            vec!["Steam/730", "Steam/570", "HoYoPlay/gopR6Cufr3"]
        );
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_build_sinks_follows_credentials() {
        let both = settings(&[
            "--telegram-token",
            "123:abc",
            "--telegram-chat-id",
            "-100",
            "--discord-webhook-url",
            "http://127.0.0.1:9/webhook",
        ]);
        let names: Vec<String> = build_sinks(&both)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["telegram", "discord"]);

        let half = settings(&["--telegram-token", "123:abc", "--discord-webhook-url", "http://x"]);
        assert_eq!(build_sinks(&half).unwrap().len(), 1);
    }
}
