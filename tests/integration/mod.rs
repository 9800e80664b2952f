// Integration tests for Deal Watcher
// These tests wire the real application with in-process collaborators

pub mod api_tests;
pub mod command_tests;
pub mod reconciler_tests;
pub mod scheduler_tests;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

use deal_watcher::{
    App, AppConfig, AppError, Deal, DealStatus, Listing, NewDeal, WatchSettings,
    config::DatabaseConfig,
    models::{DealPatch, NotificationKind, NotificationLog},
    plugins::{NotificationEvent, NotificationResult, NotifierPlugin, PluginManager, notifiers::LogNotifier},
    sources::{ListingFetcher, PageProber},
    storage::{DealStore, MemoryDealStore},
};

pub const LISTING_SOURCE: &str = "https://listings.example.com/api/deals";

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "memory".to_string(),
            max_connections: 1,
        },
        watch: WatchSettings {
            restock_source: Some(LISTING_SOURCE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Reports the configured URLs as live.
#[derive(Default)]
pub struct StubProber {
    active: HashSet<String>,
    pub calls: AtomicUsize,
}

impl StubProber {
    pub fn with_active(urls: &[&str]) -> Self {
        Self {
            active: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageProber for StubProber {
    async fn is_active(&self, url: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.active.contains(url)
    }
}

/// Serves a fixed set of listings and counts fetches.
#[derive(Default)]
pub struct StubFetcher {
    listings: Vec<Listing>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingFetcher for StubFetcher {
    async fn fetch(&self, _endpoint: &str) -> Vec<Listing> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.listings.clone()
    }
}

/// Channel that reports the first `failures` sends as undelivered.
pub struct FlakyNotifier {
    failures: usize,
    pub calls: Arc<AtomicUsize>,
}

impl FlakyNotifier {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl NotifierPlugin for FlakyNotifier {
    fn name(&self) -> &str {
        "Flaky"
    }

    fn plugin_type(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Undelivered until the outage is over"
    }

    async fn notify(
        &self,
        _event: &NotificationEvent,
    ) -> Result<NotificationResult, Box<dyn std::error::Error + Send + Sync>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Ok(NotificationResult::failed("webhook returned 503"))
        } else {
            Ok(NotificationResult::delivered(format!("flaky-{}", call)))
        }
    }
}

/// Memory store whose watchlist query blocks until the test opens the gate.
pub struct GatedStore {
    pub inner: MemoryDealStore,
    pub entered: Notify,
    pub gate: Semaphore,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDealStore::new(),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl DealStore for GatedStore {
    async fn deals_by_status(&self, status: DealStatus) -> deal_watcher::Result<Vec<Deal>> {
        if status == DealStatus::Watching {
            self.entered.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }
        self.inner.deals_by_status(status).await
    }

    async fn deal_by_id(&self, id: &str) -> deal_watcher::Result<Option<Deal>> {
        self.inner.deal_by_id(id).await
    }

    async fn all_deals(&self) -> deal_watcher::Result<Vec<Deal>> {
        self.inner.all_deals().await
    }

    async fn add_deal(&self, deal: &Deal) -> deal_watcher::Result<()> {
        self.inner.add_deal(deal).await
    }

    async fn update_deal_status(&self, id: &str, status: DealStatus) -> deal_watcher::Result<()> {
        self.inner.update_deal_status(id, status).await
    }

    async fn update_deal(&self, id: &str, patch: DealPatch) -> deal_watcher::Result<Deal> {
        self.inner.update_deal(id, patch).await
    }

    async fn delete_deal(&self, id: &str) -> deal_watcher::Result<bool> {
        self.inner.delete_deal(id).await
    }

    async fn settings(&self) -> deal_watcher::Result<Option<WatchSettings>> {
        self.inner.settings().await
    }

    async fn save_settings(&self, settings: &WatchSettings) -> deal_watcher::Result<()> {
        self.inner.save_settings(settings).await
    }

    async fn record_notification(&self, log: &NotificationLog) -> deal_watcher::Result<()> {
        self.inner.record_notification(log).await
    }

    async fn notification_by_id(&self, id: &str) -> deal_watcher::Result<Option<NotificationLog>> {
        self.inner.notification_by_id(id).await
    }

    async fn has_notification(
        &self,
        deal_id: &str,
        kind: NotificationKind,
        reference: &str,
    ) -> deal_watcher::Result<bool> {
        self.inner.has_notification(deal_id, kind, reference).await
    }
}

pub struct TestHarness {
    pub app: App,
    pub store: Arc<MemoryDealStore>,
    pub prober: Arc<StubProber>,
    pub fetcher: Arc<StubFetcher>,
}

impl TestHarness {
    pub async fn notifications_of(&self, kind: NotificationKind) -> Vec<NotificationLog> {
        self.store
            .notifications()
            .await
            .into_iter()
            .filter(|log| log.kind == kind)
            .collect()
    }

    pub async fn status_of(&self, id: &str) -> DealStatus {
        self.store
            .deal_by_id(id)
            .await
            .expect("store read")
            .expect("deal exists")
            .status
    }
}

async fn log_only_plugins() -> anyhow::Result<PluginManager> {
    let plugins = PluginManager::new();
    plugins.register_notifier(Box::new(LogNotifier::new())).await?;
    Ok(plugins)
}

pub async fn create_harness(prober: StubProber, fetcher: StubFetcher) -> anyhow::Result<TestHarness> {
    create_harness_with_plugins(prober, fetcher, log_only_plugins().await?).await
}

pub async fn create_harness_with_plugins(
    prober: StubProber,
    fetcher: StubFetcher,
    plugins: PluginManager,
) -> anyhow::Result<TestHarness> {
    let store = Arc::new(MemoryDealStore::new());
    let prober = Arc::new(prober);
    let fetcher = Arc::new(fetcher);

    let app = App::assemble(
        get_test_config(),
        store.clone(),
        plugins,
        prober.clone(),
        fetcher.clone(),
    )
    .await?;

    Ok(TestHarness {
        app,
        store,
        prober,
        fetcher,
    })
}

pub async fn create_gated_app(store: Arc<GatedStore>) -> anyhow::Result<App> {
    App::assemble(
        get_test_config(),
        store,
        log_only_plugins().await?,
        Arc::new(StubProber::default()),
        Arc::new(StubFetcher::default()),
    )
    .await
}

/// Stores a deal directly, bypassing the command surface.
pub async fn seed_deal(
    store: &dyn DealStore,
    title: &str,
    url: &str,
    expires_at: Option<String>,
    status: DealStatus,
) -> Deal {
    let deal = Deal::new(
        NewDeal {
            title: title.to_string(),
            url: url.to_string(),
            ..Default::default()
        },
        expires_at,
    );
    store.add_deal(&deal).await.expect("seed deal");
    if status != DealStatus::Watching {
        store.update_deal_status(&deal.id, status).await.expect("seed status");
    }
    deal
}
