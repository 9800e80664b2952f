use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use validator::Validate;

use crate::core::date_resolver::parse_timestamp;
use crate::models::{DealStatus, generate_id};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub title: String,
    pub url: String,

    /// Stored expiry, normally RFC 3339. May be absent or, for imported data, unparseable.
    pub expires_at: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: DealStatus,
    pub notes: Option<String>,

    /// Whatever else the source page offered (price, vendor, badge text...).
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewDeal {
    #[serde(default)]
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(url(message = "url must be an absolute URL"))]
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Free-text expiry as shown on the page ("ends in 3 days").
    #[serde(default)]
    pub expiry_text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub expires_at: Option<String>,
    pub status: Option<DealStatus>,
    pub notes: Option<String>,
    pub extra: Option<Map<String, Value>>,
}

impl Deal {
    /// Builds a `watching` record. `expires_at` is the already-normalized expiry.
    pub fn new(new_deal: NewDeal, expires_at: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title: new_deal.title.trim().to_string(),
            url: new_deal.url.trim().to_string(),
            expires_at,
            saved_at: now,
            updated_at: now,
            status: DealStatus::Watching,
            notes: new_deal.notes,
            extra: new_deal.extra,
        }
    }

    /// `None` when the deal has no expiry, `Some(Err)` when the stored value cannot be read.
    pub fn expiry(&self) -> Option<Result<DateTime<Utc>, AppError>> {
        let raw = self.expires_at.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(parse_timestamp(raw).ok_or_else(|| AppError::MalformedData {
            record: format!("deal {}", self.id),
            message: format!("unparseable expiry '{}'", raw),
        }))
    }

    pub fn apply(&mut self, patch: DealPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = Some(expires_at);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        if let Some(extra) = patch.extra {
            self.extra = extra;
        }

        self.updated_at = Utc::now();
    }
}

/// Row shape of the `deals` table.
#[derive(Debug, Clone, FromRow)]
pub struct DealRow {
    pub id: String,
    pub title: String,
    pub url: String,
    pub expires_at: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub extra: String,
}

impl TryFrom<DealRow> for Deal {
    type Error = AppError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<DealStatus>().map_err(|message| AppError::MalformedData {
            record: format!("deal {}", row.id),
            message,
        })?;
        let extra = match serde_json::from_str::<Value>(&row.extra) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                return Err(AppError::MalformedData {
                    record: format!("deal {}", row.id),
                    message: format!("extra fields are not valid JSON: {}", e),
                });
            }
        };

        Ok(Deal {
            id: row.id,
            title: row.title,
            url: row.url,
            expires_at: row.expires_at,
            saved_at: row.saved_at,
            updated_at: row.updated_at,
            status,
            notes: row.notes,
            extra,
        })
    }
}
