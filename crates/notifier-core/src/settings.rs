use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};

use crate::error::{NotifierError, Result};
use crate::ledger::{JsonFileStore, LEDGER_FILE_NAME};
use crate::time_utils::{resolve_timezone, UpdateTimeFormat, DEFAULT_DATE_FORMAT};

/// Default Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ── Settings (CLI + environment) ───────────────────────────────────────────────

/// Watch game storefronts for new builds and announce them
#[derive(Parser, Debug, Clone)]
#[command(
    name = "game-update-notifier",
    about = "Watch game storefronts for new builds and announce them",
    version
)]
pub struct Settings {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Telegram chat (or channel) id to post into
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_TELEGRAM_API_BASE)]
    pub telegram_api_base: String,

    /// Discord webhook URL
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub discord_webhook_url: Option<String>,

    /// Comma-separated Steam app ids
    #[arg(long, env = "STEAM_IDS", default_value = "")]
    pub steam_ids: String,

    /// Comma-separated HoYoPlay game ids
    #[arg(long, env = "HOYOPLAY_IDS", default_value = "")]
    pub hoyoplay_ids: String,

    /// Seconds between polling cycles
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..=86_400)
    )]
    pub interval_secs: u64,

    /// Per-request timeout in seconds (prefetch, refresh and delivery)
    #[arg(
        long,
        env = "OPERATION_TIMEOUT_SECS",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..=600)
    )]
    pub timeout_secs: u64,

    /// Ledger file (defaults to ~/.game-update-notifier/ledger.json)
    #[arg(long, env = "LEDGER_PATH")]
    pub ledger_path: Option<PathBuf>,

    /// Timezone for displayed update dates (auto-detected if not specified)
    #[arg(long, env = "TZ_NAME", default_value = "auto")]
    pub timezone: String,

    /// strftime pattern for displayed update dates
    #[arg(long, env = "DATE_FORMAT", default_value = DEFAULT_DATE_FORMAT)]
    pub date_format: String,

    /// Logging level
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Run a single polling cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl Settings {
    /// Parse the process arguments and environment.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn try_load_from<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    /// Apply the `--debug` flag.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    // ── Derived values ────────────────────────────────────────────────────────

    pub fn steam_id_list(&self) -> Vec<String> {
        parse_id_list(&self.steam_ids)
    }

    pub fn hoyoplay_id_list(&self) -> Vec<String> {
        parse_id_list(&self.hoyoplay_ids)
    }

    /// `(token, chat_id)` when both are present and non-blank.
    pub fn telegram_credentials(&self) -> Option<(&str, &str)> {
        let token = non_blank(self.telegram_token.as_deref())?;
        let chat_id = non_blank(self.telegram_chat_id.as_deref())?;
        Some((token, chat_id))
    }

    pub fn discord_webhook(&self) -> Option<&str> {
        non_blank(self.discord_webhook_url.as_deref())
    }

    /// Number of sinks the current configuration enables.
    pub fn sink_count(&self) -> usize {
        usize::from(self.telegram_credentials().is_some())
            + usize::from(self.discord_webhook().is_some())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Explicit `--ledger-path`, else the home-directory default, else
    /// `./ledger.json`.
    pub fn resolved_ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .or_else(JsonFileStore::default_path)
            .unwrap_or_else(|| PathBuf::from(LEDGER_FILE_NAME))
    }

    pub fn update_time_format(&self) -> UpdateTimeFormat {
        UpdateTimeFormat::new(resolve_timezone(&self.timezone), self.date_format.clone())
    }

    /// Reject configurations that could never do anything useful.
    pub fn validate(&self) -> Result<()> {
        if self.sink_count() == 0 {
            return Err(NotifierError::Config(
                "no notification sink configured (set TELEGRAM_TOKEN + TELEGRAM_CHAT_ID \
                 and/or DISCORD_WEBHOOK_URL)"
                    .to_string(),
            ));
        }

        if self.steam_id_list().is_empty() && self.hoyoplay_id_list().is_empty() {
            return Err(NotifierError::Config(
                "no games to track (set STEAM_IDS and/or HOYOPLAY_IDS)".to_string(),
            ));
        }

        if self.telegram_token.is_some() != self.telegram_chat_id.is_some() {
            tracing::warn!("telegram sink needs both a token and a chat id; skipping it");
        }

        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(NotifierError::Config(format!(
                "invalid date format: {}",
                self.date_format
            )));
        }

        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// Split a comma-separated id list, trimming whitespace, dropping blanks and
/// collapsing duplicates (first occurrence wins).
pub fn parse_id_list(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn parse(args: &[&str]) -> Settings {
        let mut full = vec!["game-update-notifier"];
        full.extend_from_slice(args);
        Settings::try_load_from(full).expect("valid arguments")
    }

    fn configured(extra: &[&str]) -> Settings {
        let mut args = vec![
            "--telegram-token",
            "123:abc",
            "--telegram-chat-id",
            "-100200",
            "--steam-ids",
            "730",
        ];
        args.extend_from_slice(extra);
        parse(&args)
    }

    // ── parse_id_list ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_id_list_basic() {
        assert_eq!(parse_id_list("730,570"), vec!["730", "570"]);
    }

    #[test]
    fn test_parse_id_list_trims_and_drops_blanks() {
        assert_eq!(parse_id_list(" 730 , ,570,, "), vec!["730", "570"]);
        assert!(parse_id_list("").is_empty());
        assert!(parse_id_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_id_list_dedupes_keeping_first() {
        assert_eq!(parse_id_list("570,730,570"), vec!["570", "730"]);
    }

    // ── Defaults / CLI parsing ────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = parse(&[]);
        assert_eq!(settings.interval_secs, 60);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.date_format, "%Y-%m-%d");
        assert_eq!(settings.telegram_api_base, DEFAULT_TELEGRAM_API_BASE);
        assert!(!settings.debug);
        assert!(!settings.once);
        assert_eq!(settings.interval(), Duration::from_secs(60));
        assert_eq!(settings.operation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = parse(&["--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_settings_interval_range_enforced() {
        let result = Settings::try_load_from(["game-update-notifier", "--interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_unknown_log_level() {
        let result = Settings::try_load_from(["game-update-notifier", "--log-level", "LOUD"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_id_lists() {
        let settings = parse(&["--steam-ids", "730, 570", "--hoyoplay-ids", "1Z8W5NHUQb"]);
        assert_eq!(settings.steam_id_list(), vec!["730", "570"]);
        assert_eq!(settings.hoyoplay_id_list(), vec!["1Z8W5NHUQb"]);
    }

    #[test]
    fn test_settings_explicit_ledger_path() {
        let settings = parse(&["--ledger-path", "/tmp/state/ledger.json"]);
        assert_eq!(
            settings.resolved_ledger_path(),
            PathBuf::from("/tmp/state/ledger.json")
        );
    }

    #[test]
    fn test_settings_update_time_format() {
        let settings = parse(&["--timezone", "UTC", "--date-format", "%d/%m/%Y"]);
        assert_eq!(settings.update_time_format().format_epoch(0), "01/01/1970");
    }

    // ── Sinks ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_telegram_requires_both_values() {
        let settings = parse(&["--telegram-token", "123:abc"]);
        assert!(settings.telegram_credentials().is_none());

        let settings = parse(&["--telegram-token", "123:abc", "--telegram-chat-id", "42"]);
        assert_eq!(settings.telegram_credentials(), Some(("123:abc", "42")));
    }

    #[test]
    fn test_blank_credentials_are_ignored() {
        let settings = parse(&["--discord-webhook-url", "  "]);
        assert!(settings.discord_webhook().is_none());
        assert_eq!(settings.sink_count(), 0);
    }

    #[test]
    fn test_sink_count_both() {
        let settings = configured(&["--discord-webhook-url", "https://discord.test/hook"]);
        assert_eq!(settings.sink_count(), 2);
    }

    // ── validate ──────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_ok() {
        assert!(configured(&[]).validate().is_ok());
    }

    #[test]
    fn test_validate_requires_sink() {
        let settings = parse(&["--steam-ids", "730"]);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("no notification sink"));
    }

    #[test]
    fn test_validate_requires_games() {
        let settings = parse(&["--discord-webhook-url", "https://discord.test/hook"]);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("no games to track"));
    }

    #[test]
    fn test_validate_rejects_bad_date_format() {
        let settings = configured(&["--date-format", "%Q"]);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("invalid date format"));
    }
}
