use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::models::{Deal, DealStatus};
use crate::notifier::Notifier;
use crate::storage::DealStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordFailure {
    pub deal_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpiryReport {
    pub checked: usize,
    pub expired: usize,
    pub warned: usize,
    pub skipped_no_expiry: usize,
    pub malformed: usize,
    pub failures: Vec<RecordFailure>,
    pub total_time_ms: u64,
}

enum ExpiryOutcome {
    NoExpiry,
    Expired,
    Warned,
    Fine,
}

/// Moves expired `watching` deals to `missed` and warns about the ones close to expiring.
pub struct ExpiryReconciler {
    store: Arc<dyn DealStore>,
    notifier: Arc<dyn Notifier>,
}

impl ExpiryReconciler {
    pub fn new(store: Arc<dyn DealStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn run(&self, config: &WatchConfig) -> Result<ExpiryReport> {
        self.run_at(config, Utc::now()).await
    }

    /// Only fetching the batch can fail; per-deal errors end up in the report.
    pub async fn run_at(&self, config: &WatchConfig, now: DateTime<Utc>) -> Result<ExpiryReport> {
        let start = Instant::now();
        let deals = self.store.deals_by_status(DealStatus::Watching).await?;

        let mut report = ExpiryReport {
            checked: deals.len(),
            ..Default::default()
        };

        for deal in &deals {
            match self.check_deal(deal, config, now).await {
                Ok(ExpiryOutcome::NoExpiry) => report.skipped_no_expiry += 1,
                Ok(ExpiryOutcome::Expired) => report.expired += 1,
                Ok(ExpiryOutcome::Warned) => report.warned += 1,
                Ok(ExpiryOutcome::Fine) => {}
                Err(e) => {
                    if matches!(e, AppError::MalformedData { .. }) {
                        report.malformed += 1;
                    }
                    warn!(deal_id = %deal.id, error = %e, "Expiry check failed for deal");
                    report.failures.push(RecordFailure {
                        deal_id: deal.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.total_time_ms = start.elapsed().as_millis() as u64;

        counter!("deal_watcher_expiry_runs_total").increment(1);
        counter!("deal_watcher_deals_expired_total").increment(report.expired as u64);
        histogram!("deal_watcher_expiry_run_duration_ms").record(report.total_time_ms as f64);

        info!(
            checked = report.checked,
            expired = report.expired,
            warned = report.warned,
            malformed = report.malformed,
            failures = report.failures.len(),
            total_time_ms = report.total_time_ms,
            "Expiry check finished"
        );

        Ok(report)
    }

    async fn check_deal(&self, deal: &Deal, config: &WatchConfig, now: DateTime<Utc>) -> Result<ExpiryOutcome> {
        let expiry = match deal.expiry() {
            None => return Ok(ExpiryOutcome::NoExpiry),
            Some(parsed) => parsed?,
        };

        if expiry < now {
            self.store.update_deal_status(&deal.id, DealStatus::Missed).await?;
            info!(deal_id = %deal.id, title = %deal.title, expired_at = %expiry, "Deal expired, marked as missed");
            return Ok(ExpiryOutcome::Expired);
        }

        let remaining = (expiry - now).to_std().unwrap_or_default();
        if remaining < config.expiry_warning_lead {
            debug!(deal_id = %deal.id, remaining_secs = remaining.as_secs(), "Deal expiring soon");
            self.notifier.show_expiry_warning(deal).await?;
            return Ok(ExpiryOutcome::Warned);
        }

        Ok(ExpiryOutcome::Fine)
    }
}
