use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::DealStore;
use crate::config::WatchSettings;
use crate::models::{Deal, DealPatch, DealStatus, NotificationKind, NotificationLog};
use crate::utils::error::{AppError, Result};

/// In-process store. Backs `database.url = "memory"` and the test suites.
#[derive(Default)]
pub struct MemoryDealStore {
    deals: RwLock<HashMap<String, Deal>>,
    settings: RwLock<Option<WatchSettings>>,
    notifications: RwLock<Vec<NotificationLog>>,
}

impl MemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<NotificationLog> {
        self.notifications.read().await.clone()
    }
}

fn sorted(mut deals: Vec<Deal>) -> Vec<Deal> {
    deals.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.id.cmp(&b.id)));
    deals
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn deals_by_status(&self, status: DealStatus) -> Result<Vec<Deal>> {
        let deals = self.deals.read().await;
        Ok(sorted(
            deals.values().filter(|d| d.status == status).cloned().collect(),
        ))
    }

    async fn deal_by_id(&self, id: &str) -> Result<Option<Deal>> {
        Ok(self.deals.read().await.get(id).cloned())
    }

    async fn all_deals(&self) -> Result<Vec<Deal>> {
        Ok(sorted(self.deals.read().await.values().cloned().collect()))
    }

    async fn add_deal(&self, deal: &Deal) -> Result<()> {
        let mut deals = self.deals.write().await;
        if deals.contains_key(&deal.id) {
            return Err(AppError::validation(format!("deal {} already exists", deal.id)));
        }
        deals.insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn update_deal_status(&self, id: &str, status: DealStatus) -> Result<()> {
        let mut deals = self.deals.write().await;
        let deal = deals.get_mut(id).ok_or_else(|| AppError::deal_not_found(id))?;
        deal.status = status;
        deal.updated_at = Utc::now();
        Ok(())
    }

    async fn update_deal(&self, id: &str, patch: DealPatch) -> Result<Deal> {
        let mut deals = self.deals.write().await;
        let deal = deals.get_mut(id).ok_or_else(|| AppError::deal_not_found(id))?;
        deal.apply(patch);
        Ok(deal.clone())
    }

    async fn delete_deal(&self, id: &str) -> Result<bool> {
        Ok(self.deals.write().await.remove(id).is_some())
    }

    async fn settings(&self) -> Result<Option<WatchSettings>> {
        Ok(self.settings.read().await.clone())
    }

    async fn save_settings(&self, settings: &WatchSettings) -> Result<()> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }

    async fn record_notification(&self, log: &NotificationLog) -> Result<()> {
        self.notifications.write().await.push(log.clone());
        Ok(())
    }

    async fn notification_by_id(&self, id: &str) -> Result<Option<NotificationLog>> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .find(|log| log.id == id)
            .cloned())
    }

    async fn has_notification(
        &self,
        deal_id: &str,
        kind: NotificationKind,
        reference: &str,
    ) -> Result<bool> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .any(|log| log.matches(deal_id, kind, reference)))
    }
}
