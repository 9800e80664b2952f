use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::models::{
    Deal, Listing, NotificationKind, NotificationLog, RestockInfo, RestockKind, generate_id,
};
use crate::plugins::PluginManager;
use crate::plugins::traits::{DealInfo, NotificationEvent};
use crate::storage::DealStore;
use crate::utils::error::{AppError, Result};

/// User-facing notifications raised by the reconcilers and commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show_expiry_warning(&self, deal: &Deal) -> Result<()>;

    async fn show_restock_alert(&self, original: &Deal, restock: &RestockInfo) -> Result<()>;

    async fn show_save_confirmation(&self, title: &str) -> Result<()>;

    /// URL to open when the user clicks the notification with this id.
    async fn deal_url_from_notification_id(&self, notification_id: &str) -> Result<Option<String>>;
}

struct Outgoing {
    kind: NotificationKind,
    deal: DealInfo,
    listing: Option<Listing>,
    reference: Option<String>,
    title: String,
    message: String,
}

/// Logs every notification, then fans it out to the registered channels.
pub struct DealNotifier {
    plugins: PluginManager,
    store: Arc<dyn DealStore>,
    dedup: bool,
}

impl DealNotifier {
    pub fn new(plugins: PluginManager, store: Arc<dyn DealStore>, dedup: bool) -> Self {
        Self { plugins, store, dedup }
    }

    async fn emit(&self, outgoing: Outgoing) -> Result<()> {
        if self.dedup {
            if let (Some(deal_id), Some(reference)) = (&outgoing.deal.id, &outgoing.reference) {
                if self.store.has_notification(deal_id, outgoing.kind, reference).await? {
                    debug!(deal_id = %deal_id, kind = %outgoing.kind, reference = %reference, "Suppressed repeat notification");
                    return Ok(());
                }
            }
        }

        let event = NotificationEvent {
            id: generate_id(),
            kind: outgoing.kind,
            deal: outgoing.deal,
            listing: outgoing.listing,
            title: outgoing.title,
            message: outgoing.message,
            created_at: Utc::now(),
        };

        let results = self.plugins.dispatch(&event).await;
        let delivered = results
            .iter()
            .any(|(_, outcome)| matches!(outcome, Ok(result) if result.success));

        // Only delivered notifications are logged, so an undelivered one is retried next cycle.
        if !results.is_empty() && !delivered {
            return Err(AppError::Notification(format!(
                "{} notification for '{}' was not delivered by any channel",
                event.kind, event.deal.title
            )));
        }

        let log = NotificationLog {
            id: event.id.clone(),
            deal_id: event.deal.id.clone(),
            kind: event.kind,
            url: event.target_url().map(str::to_string),
            reference: outgoing.reference,
            created_at: event.created_at,
        };
        self.store.record_notification(&log).await?;

        metrics::counter!("deal_watcher_notifications_total", "kind" => event.kind.as_str()).increment(1);
        Ok(())
    }
}

#[async_trait]
impl Notifier for DealNotifier {
    async fn show_expiry_warning(&self, deal: &Deal) -> Result<()> {
        let ends = deal.expires_at.clone().unwrap_or_default();
        self.emit(Outgoing {
            kind: NotificationKind::ExpiryWarning,
            deal: DealInfo::from(deal),
            listing: None,
            reference: deal.expires_at.clone(),
            title: "Deal expiring soon".to_string(),
            message: format!("\"{}\" ends at {}", deal.title, ends),
        })
        .await
    }

    async fn show_restock_alert(&self, original: &Deal, restock: &RestockInfo) -> Result<()> {
        let outgoing = match (restock.kind, &restock.listing) {
            (RestockKind::OriginalUrlActive, _) => Outgoing {
                kind: NotificationKind::OriginalUrlActive,
                deal: DealInfo::from(original),
                listing: None,
                reference: None,
                title: "Deal is back".to_string(),
                message: format!("\"{}\" is available again at its original page", original.title),
            },
            (RestockKind::SimilarNewListing, Some(listing)) => Outgoing {
                kind: NotificationKind::SimilarNewListing,
                deal: DealInfo::from(original),
                listing: Some(listing.clone()),
                reference: Some(listing.url.clone()),
                title: "Similar deal listed".to_string(),
                message: format!("\"{}\" looks like the missed deal \"{}\"", listing.title, original.title),
            },
            (RestockKind::SimilarNewListing, None) => {
                return Err(AppError::Internal("similar listing alert without a listing".to_string()));
            }
        };

        self.emit(outgoing).await
    }

    async fn show_save_confirmation(&self, title: &str) -> Result<()> {
        self.emit(Outgoing {
            kind: NotificationKind::SaveConfirmation,
            deal: DealInfo {
                id: None,
                title: title.to_string(),
                url: None,
            },
            listing: None,
            reference: None,
            title: "Deal saved".to_string(),
            message: format!("\"{}\" is on your watchlist", title),
        })
        .await
    }

    async fn deal_url_from_notification_id(&self, notification_id: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .notification_by_id(notification_id)
            .await?
            .and_then(|log| log.url))
    }
}
