use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod deal;
pub mod listing;
pub mod notification_log;
pub mod system_setting;

// Re-exports for convenience
pub use deal::*;
pub use listing::*;
pub use notification_log::*;
pub use system_setting::*;

/// Lifecycle of a saved deal as seen by the reconcilers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Watching,
    Missed,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Watching => "watching",
            DealStatus::Missed => "missed",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watching" => Ok(DealStatus::Watching),
            "missed" => Ok(DealStatus::Missed),
            other => Err(format!("unknown deal status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ExpiryWarning,
    OriginalUrlActive,
    SimilarNewListing,
    SaveConfirmation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ExpiryWarning => "expiry_warning",
            NotificationKind::OriginalUrlActive => "original_url_active",
            NotificationKind::SimilarNewListing => "similar_new_listing",
            NotificationKind::SaveConfirmation => "save_confirmation",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expiry_warning" => Ok(NotificationKind::ExpiryWarning),
            "original_url_active" => Ok(NotificationKind::OriginalUrlActive),
            "similar_new_listing" => Ok(NotificationKind::SimilarNewListing),
            "save_confirmation" => Ok(NotificationKind::SaveConfirmation),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
