use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::DiscordConfig;
use crate::models::NotificationKind;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(client: Client, config: DiscordConfig) -> Self {
        Self { client, config }
    }

    fn get_embed_color(&self, kind: NotificationKind) -> u32 {
        match kind {
            NotificationKind::ExpiryWarning => 0xff9900,
            NotificationKind::OriginalUrlActive => 0x00ff00,
            NotificationKind::SimilarNewListing => 0x0099ff,
            NotificationKind::SaveConfirmation => 0x888888,
        }
    }

    fn get_emoji(&self, kind: NotificationKind) -> &str {
        match kind {
            NotificationKind::ExpiryWarning => "⏰",
            NotificationKind::OriginalUrlActive => "🔁",
            NotificationKind::SimilarNewListing => "🆕",
            NotificationKind::SaveConfirmation => "📌",
        }
    }

    fn create_embed(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut fields = vec![json!({
            "name": "Deal",
            "value": match &event.deal.url {
                Some(url) => format!("[{}]({})", event.deal.title, url),
                None => event.deal.title.clone(),
            },
            "inline": false
        })];

        if let Some(listing) = &event.listing {
            fields.push(json!({
                "name": "New listing",
                "value": format!("[{}]({})", listing.title, listing.url),
                "inline": false
            }));
        }

        let mut embed = json!({
            "title": format!("{} {}", self.get_emoji(event.kind), event.title),
            "description": event.message,
            "color": self.get_embed_color(event.kind),
            "timestamp": event.created_at.to_rfc3339(),
            "fields": fields,
            "footer": { "text": "Deal Watcher" }
        });

        if let Some(url) = event.target_url() {
            embed["url"] = json!(url);
        }

        embed
    }

    fn create_webhook_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut payload = json!({
            "embeds": [self.create_embed(event)]
        });

        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    fn description(&self) -> &str {
        "Sends deal alerts via Discord webhooks with embeds"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, Box<dyn std::error::Error + Send + Sync>> {
        let payload = self.create_webhook_payload(event);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(NotificationResult::delivered(format!("discord-{}", event.id)))
        } else {
            Ok(NotificationResult::failed(format!("Discord webhook returned {}", status)))
        }
    }
}
