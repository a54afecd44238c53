//! Telegram Bot API sink: one `sendPhoto` per changed entity.

use async_trait::async_trait;
use notifier_core::error::{NotifierError, Result};
use notifier_core::models::EntitySnapshot;
use notifier_core::traits::NotificationSink;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PATCH_NOTES_BUTTON: &str = "Open Patch Notes";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, PartialEq)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: String,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<UrlButton<'a>>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct UrlButton<'a> {
    text: &'static str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

// ── TelegramSink ──────────────────────────────────────────────────────────────

pub struct TelegramSink {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(
        client: Client,
        api_base: &str,
        token: &str,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendPhoto", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.into(),
        }
    }

    fn request_body<'a>(&'a self, snapshot: &'a EntitySnapshot) -> SendPhoto<'a> {
        let reply_markup = snapshot.has_patch_notes().then(|| InlineKeyboard {
            inline_keyboard: vec![vec![UrlButton {
                text: PATCH_NOTES_BUTTON,
                url: &snapshot.patch_notes_url,
            }]],
        });

        SendPhoto {
            chat_id: &self.chat_id,
            photo: &snapshot.image_url,
            caption: caption(snapshot),
            parse_mode: "Markdown",
            reply_markup,
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, snapshot: &EntitySnapshot) -> Result<()> {
        // The endpoint embeds the bot token; keep it out of error messages.
        let redacted = "telegram sendPhoto";

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(snapshot))
            .send()
            .await
            .map_err(|e| NotifierError::http(redacted, e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifierError::http(redacted, e.without_url()))?;
        tracing::trace!(status = status.as_u16(), %body, "telegram response");

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.ok => Ok(()),
            Ok(api) => Err(NotifierError::DeliveryRejected {
                sink: self.name().to_string(),
                reason: api
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            }),
            Err(_) if status.is_success() => Err(NotifierError::Payload(format!(
                "{redacted} answered with a non-JSON body"
            ))),
            Err(_) => Err(NotifierError::UnexpectedStatus {
                url: redacted.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

// ── Caption ───────────────────────────────────────────────────────────────────

/// Message caption in Telegram's legacy Markdown.
pub fn caption(snapshot: &EntitySnapshot) -> String {
    format!(
        "{} ({})\n\nID: {}\nVersion: {}\nUpdate Time: {}",
        bold(&snapshot.display_name),
        escape_markdown(&snapshot.platform),
        bold(&snapshot.unique_id),
        bold(&snapshot.version),
        bold(&snapshot.update_time),
    )
}

fn is_markdown_special(c: char) -> bool {
    matches!(c, '_' | '*' | '`' | '[')
}

/// Escape the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_markdown_special(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap `text` in bold entities.
///
/// Legacy Markdown does not honour escapes inside an entity, so the bold run is
/// closed before each special character, which is escaped outside it.
pub fn bold(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut run = String::new();
    for c in text.chars() {
        if is_markdown_special(c) {
            push_bold_run(&mut out, &mut run);
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    push_bold_run(&mut out, &mut run);
    out
}

fn push_bold_run(out: &mut String, run: &mut String) {
    if !run.is_empty() {
        out.push('*');
        out.push_str(run);
        out.push('*');
        run.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
