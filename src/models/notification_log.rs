use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{NotificationKind, generate_id};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationLog {
    pub id: String,
    pub deal_id: Option<String>,
    pub kind: NotificationKind,
    /// Page the notification points at; resolved when the user clicks it.
    pub url: Option<String>,
    /// What the notification was about (expiry value, candidate URL). Used for de-duplication.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotificationLog {
    pub deal_id: Option<String>,
    pub kind: NotificationKind,
    pub url: Option<String>,
    pub reference: Option<String>,
}

impl NotificationLog {
    pub fn new(new_log: NewNotificationLog) -> Self {
        Self {
            id: generate_id(),
            deal_id: new_log.deal_id,
            kind: new_log.kind,
            url: new_log.url,
            reference: new_log.reference,
            created_at: Utc::now(),
        }
    }

    pub fn matches(&self, deal_id: &str, kind: NotificationKind, reference: &str) -> bool {
        self.deal_id.as_deref() == Some(deal_id)
            && self.kind == kind
            && self.reference.as_deref() == Some(reference)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationLogRow {
    pub id: String,
    pub deal_id: Option<String>,
    pub kind: String,
    pub url: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationLogRow> for NotificationLog {
    type Error = AppError;

    fn try_from(row: NotificationLogRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<NotificationKind>().map_err(|message| AppError::MalformedData {
            record: format!("notification {}", row.id),
            message,
        })?;

        Ok(NotificationLog {
            id: row.id,
            deal_id: row.deal_id,
            kind,
            url: row.url,
            reference: row.reference,
            created_at: row.created_at,
        })
    }
}
