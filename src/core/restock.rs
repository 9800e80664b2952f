use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::expiry::RecordFailure;
use super::similarity::SimilarityScorer;
use crate::config::WatchConfig;
use crate::models::{Deal, DealStatus, Listing, RestockInfo};
use crate::notifier::Notifier;
use crate::sources::{ListingFetcher, PageProber};
use crate::storage::DealStore;
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RestockReport {
    pub checked: usize,
    pub original_url_active: usize,
    pub similar_listings: usize,
    pub unmatched: usize,
    pub listings_fetched: usize,
    pub failures: Vec<RecordFailure>,
    pub total_time_ms: u64,
}

enum RestockOutcome {
    OriginalUrlActive,
    SimilarListing,
    Unmatched,
}

/// Looks for missed deals that became available again.
pub struct RestockReconciler {
    store: Arc<dyn DealStore>,
    notifier: Arc<dyn Notifier>,
    prober: Arc<dyn PageProber>,
    fetcher: Arc<dyn ListingFetcher>,
    scorer: SimilarityScorer,
}

impl RestockReconciler {
    pub fn new(
        store: Arc<dyn DealStore>,
        notifier: Arc<dyn Notifier>,
        prober: Arc<dyn PageProber>,
        fetcher: Arc<dyn ListingFetcher>,
    ) -> Self {
        Self {
            store,
            notifier,
            prober,
            fetcher,
            scorer: SimilarityScorer::new(),
        }
    }

    pub async fn run(&self, config: &WatchConfig) -> Result<RestockReport> {
        let start = Instant::now();
        let deals = self.store.deals_by_status(DealStatus::Missed).await?;

        let mut report = RestockReport {
            checked: deals.len(),
            ..Default::default()
        };

        // Fetched on first need, then shared by every deal in this run.
        let mut listings: Option<Vec<Listing>> = None;

        for deal in &deals {
            match self.check_deal(deal, config, &mut listings).await {
                Ok(RestockOutcome::OriginalUrlActive) => report.original_url_active += 1,
                Ok(RestockOutcome::SimilarListing) => report.similar_listings += 1,
                Ok(RestockOutcome::Unmatched) => report.unmatched += 1,
                Err(e) => {
                    warn!(deal_id = %deal.id, error = %e, "Restock check failed for deal");
                    report.failures.push(RecordFailure {
                        deal_id: deal.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.listings_fetched = listings.as_ref().map_or(0, Vec::len);
        report.total_time_ms = start.elapsed().as_millis() as u64;

        counter!("deal_watcher_restock_runs_total").increment(1);
        counter!("deal_watcher_restocks_detected_total")
            .increment((report.original_url_active + report.similar_listings) as u64);
        histogram!("deal_watcher_restock_run_duration_ms").record(report.total_time_ms as f64);

        info!(
            checked = report.checked,
            original_url_active = report.original_url_active,
            similar_listings = report.similar_listings,
            listings = report.listings_fetched,
            failures = report.failures.len(),
            total_time_ms = report.total_time_ms,
            "Restock check finished"
        );

        Ok(report)
    }

    async fn check_deal(
        &self,
        deal: &Deal,
        config: &WatchConfig,
        listings: &mut Option<Vec<Listing>>,
    ) -> Result<RestockOutcome> {
        if !deal.url.trim().is_empty() && self.prober.is_active(&deal.url).await {
            self.notifier
                .show_restock_alert(deal, &RestockInfo::original_url_active())
                .await?;
            self.store.update_deal_status(&deal.id, DealStatus::Watching).await?;
            info!(deal_id = %deal.id, title = %deal.title, "Original deal page is live again");
            return Ok(RestockOutcome::OriginalUrlActive);
        }

        if listings.is_none() {
            *listings = Some(self.load_listings(config).await);
        }
        let candidates = listings.as_deref().unwrap_or_default();

        let matched = candidates.iter().find(|candidate| {
            candidate.is_usable()
                && self
                    .scorer
                    .is_similar(&deal.title, &candidate.title, config.similarity_threshold)
        });

        match matched {
            Some(candidate) => {
                debug!(deal_id = %deal.id, candidate = %candidate.title, url = %candidate.url, "Found similar listing");
                self.notifier
                    .show_restock_alert(deal, &RestockInfo::similar_new_listing(candidate.clone()))
                    .await?;
                Ok(RestockOutcome::SimilarListing)
            }
            None => Ok(RestockOutcome::Unmatched),
        }
    }

    async fn load_listings(&self, config: &WatchConfig) -> Vec<Listing> {
        let source = config.restock_source.trim();
        if source.is_empty() {
            debug!("No restock source configured");
            return Vec::new();
        }
        self.fetcher.fetch(source).await
    }
}
