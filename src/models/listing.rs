use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate listing from the configured deal source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default, alias = "link", alias = "href")]
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Listing {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Candidates without a title or URL never take part in matching.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestockKind {
    OriginalUrlActive,
    SimilarNewListing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestockInfo {
    pub kind: RestockKind,
    /// Present for `similar_new_listing`.
    pub listing: Option<Listing>,
    pub detected_at: DateTime<Utc>,
}

impl RestockInfo {
    pub fn original_url_active() -> Self {
        Self {
            kind: RestockKind::OriginalUrlActive,
            listing: None,
            detected_at: Utc::now(),
        }
    }

    pub fn similar_new_listing(listing: Listing) -> Self {
        Self {
            kind: RestockKind::SimilarNewListing,
            listing: Some(listing),
            detected_at: Utc::now(),
        }
    }
}
