//! Persistence of deals, watch settings and the notification log.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DatabaseConfig, WatchSettings};
use crate::models::{Deal, DealPatch, DealStatus, NotificationKind, NotificationLog};
use crate::utils::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDealStore;
pub use sqlite::SqliteDealStore;

/// `database.url` value that selects the in-process store.
pub const MEMORY_URL: &str = "memory";

/// Every status transition is a keyed update of one record; callers never write back
/// a previously read snapshot.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn deals_by_status(&self, status: DealStatus) -> Result<Vec<Deal>>;

    async fn deal_by_id(&self, id: &str) -> Result<Option<Deal>>;

    async fn all_deals(&self) -> Result<Vec<Deal>>;

    async fn add_deal(&self, deal: &Deal) -> Result<()>;

    /// Fails with `NotFound` when no record has this id.
    async fn update_deal_status(&self, id: &str, status: DealStatus) -> Result<()>;

    async fn update_deal(&self, id: &str, patch: DealPatch) -> Result<Deal>;

    /// Returns whether a record was removed.
    async fn delete_deal(&self, id: &str) -> Result<bool>;

    /// Persisted overrides, `None` when nothing has been saved yet.
    async fn settings(&self) -> Result<Option<WatchSettings>>;

    async fn save_settings(&self, settings: &WatchSettings) -> Result<()>;

    async fn record_notification(&self, log: &NotificationLog) -> Result<()>;

    async fn notification_by_id(&self, id: &str) -> Result<Option<NotificationLog>>;

    async fn has_notification(
        &self,
        deal_id: &str,
        kind: NotificationKind,
        reference: &str,
    ) -> Result<bool>;
}

pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DealStore>> {
    if config.url == MEMORY_URL {
        tracing::info!("Using in-memory deal store");
        return Ok(Arc::new(MemoryDealStore::new()));
    }

    let store = SqliteDealStore::connect(config).await?;
    Ok(Arc::new(store))
}
