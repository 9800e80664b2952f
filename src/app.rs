use anyhow::Result;
use std::sync::Arc;

use crate::commands::CommandRouter;
use crate::config::{AppConfig, ConfigStore};
use crate::core::{ExpiryReconciler, RestockReconciler};
use crate::notifier::{DealNotifier, Notifier};
use crate::plugins::PluginManager;
use crate::scheduler::{CycleRunner, DealScheduler};
use crate::sources::{HttpListingFetcher, HttpPageProber, ListingFetcher, PageProber, build_client};
use crate::storage::{self, DealStore};

/// Everything a running watcher needs, wired once at startup.
pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn DealStore>,
    pub plugins: PluginManager,
    pub notifier: Arc<dyn Notifier>,
    pub config_store: Arc<ConfigStore>,
    pub scheduler: Arc<DealScheduler>,
    pub router: Arc<CommandRouter>,
}

impl App {
    /// Production wiring: configured store, reqwest client and notification channels.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = storage::connect(&config.database).await?;
        let client = build_client(&config.http)?;
        let plugins = PluginManager::from_config(&config.notifications, client.clone()).await?;
        let prober: Arc<dyn PageProber> = Arc::new(HttpPageProber::new(client.clone()));
        let fetcher: Arc<dyn ListingFetcher> = Arc::new(HttpListingFetcher::new(client, &config.http));

        Self::assemble(config, store, plugins, prober, fetcher).await
    }

    pub async fn assemble(
        config: AppConfig,
        store: Arc<dyn DealStore>,
        plugins: PluginManager,
        prober: Arc<dyn PageProber>,
        fetcher: Arc<dyn ListingFetcher>,
    ) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = Arc::new(DealNotifier::new(
            plugins.clone(),
            Arc::clone(&store),
            config.notifications.dedup,
        ));

        let config_store = Arc::new(ConfigStore::new(config.watch_defaults()?, Arc::clone(&store)));
        config_store.load().await;

        let expiry = ExpiryReconciler::new(Arc::clone(&store), Arc::clone(&notifier));
        let restock = RestockReconciler::new(Arc::clone(&store), Arc::clone(&notifier), prober, fetcher);
        let runner = Arc::new(CycleRunner::new(Arc::clone(&config_store), expiry, restock));
        let scheduler = Arc::new(DealScheduler::new(runner).await?);

        let router = Arc::new(CommandRouter::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&config_store),
            Arc::clone(&scheduler),
        ));

        tracing::info!(
            channels = ?plugins.list_notifier_types().await,
            "Deal watcher assembled"
        );

        Ok(Self {
            config,
            store,
            plugins,
            notifier,
            config_store,
            scheduler,
            router,
        })
    }

    /// Arms both triggers from the current configuration and starts ticking.
    pub async fn start(&self) -> Result<()> {
        self.scheduler.reload().await?;
        self.scheduler.start().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await?;
        self.plugins.shutdown().await?;
        Ok(())
    }
}
