use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Deal, Listing, NotificationKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Same id as the notification log entry, so a click can be resolved back to a URL.
    pub id: String,
    pub kind: NotificationKind,
    pub deal: DealInfo,
    pub listing: Option<Listing>,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealInfo {
    pub id: Option<String>,
    pub title: String,
    pub url: Option<String>,
}

impl From<&Deal> for DealInfo {
    fn from(deal: &Deal) -> Self {
        Self {
            id: Some(deal.id.clone()),
            title: deal.title.clone(),
            url: Some(deal.url.clone()).filter(|u| !u.is_empty()),
        }
    }
}

impl NotificationEvent {
    /// Where clicking the notification should lead: the new listing if there is one.
    pub fn target_url(&self) -> Option<&str> {
        self.listing
            .as_ref()
            .map(|l| l.url.as_str())
            .or(self.deal.url.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// A delivery channel for deal notifications (log, email, Discord, ...).
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, Box<dyn std::error::Error + Send + Sync>>;

    async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
