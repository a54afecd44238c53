//! Discord webhook sink: one embed per changed entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_core::error::{NotifierError, Result};
use notifier_core::models::EntitySnapshot;
use notifier_core::traits::NotificationSink;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    thumbnail: Thumbnail,
    fields: Vec<EmbedField>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn inline(name: &'static str, value: &str) -> Self {
        Self {
            name,
            value: value.to_string(),
            inline: true,
        }
    }
}

pub struct DiscordSink {
    client: Client,
    webhook_url: String,
}

impl DiscordSink {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

/// Build the webhook body for `snapshot`, stamped with `now`.
fn embed_payload(snapshot: &EntitySnapshot, now: DateTime<Utc>) -> WebhookPayload {
    let mut fields = vec![
        EmbedField::inline("🆔 ID", &snapshot.unique_id),
        EmbedField::inline("📦 Version", &snapshot.version),
        EmbedField::inline("⏰ Update Time", &snapshot.update_time),
    ];
    if snapshot.has_patch_notes() {
        fields.push(EmbedField {
            name: "📜 Patch Notes",
            value: format!("[Click here]({})", snapshot.patch_notes_url),
            inline: false,
        });
    }

    WebhookPayload {
        embeds: vec![Embed {
            title: snapshot.display_name.clone(),
            description: snapshot.platform.clone(),
            thumbnail: Thumbnail {
                url: snapshot.image_url.clone(),
            },
            fields,
            timestamp: now.to_rfc3339(),
        }],
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &str {
        "discord"
    }

    async fn deliver(&self, snapshot: &EntitySnapshot) -> Result<()> {
        // Webhook URLs carry their secret in the path.
        let redacted = "discord webhook";

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&embed_payload(snapshot, Utc::now()))
            .send()
            .await
            .map_err(|e| NotifierError::http(redacted, e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "discord rejected webhook");
        Err(NotifierError::UnexpectedStatus {
            url: redacted.to_string(),
            status: status.as_u16(),
        })
    }
}
