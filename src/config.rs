use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::storage::DealStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    /// Replaces the compiled watch defaults before persisted overrides apply.
    pub watch: WatchSettings,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, or `memory` for the in-process store.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Suppress repeat alerts about the same thing.
    pub dedup: bool,
    pub log_enabled: bool,
    pub smtp: Option<SmtpConfig>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Daily rolling log files are written here when set.
    pub directory: Option<String>,
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://deal-watcher.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            user_agent: format!("deal-watcher/{}", env!("CARGO_PKG_VERSION")),
            retry_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dedup: true,
            log_enabled: true,
            smtp: None,
            discord: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "deal_watcher=debug".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl AppConfig {
    /// Compiled defaults, then `config/default`, `config/{RUN_MODE}`, `config/local`,
    /// an explicit file if given, then `DEAL_WATCHER__*` environment variables.
    pub fn load(path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let s = builder
            .add_source(
                Environment::with_prefix("DEAL_WATCHER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::Message("HTTP request_timeout_secs must be greater than 0".into()));
        }

        if self.http.retry_attempts == 0 {
            return Err(ConfigError::Message("HTTP retry_attempts must be at least 1".into()));
        }

        WatchConfig::default()
            .merged(&self.watch)
            .map_err(|e| ConfigError::Message(format!("Invalid watch section: {}", e)))?;

        if let Some(smtp) = &self.notifications.smtp {
            if smtp.port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
            if smtp.to_address.trim().is_empty() {
                return Err(ConfigError::Message("SMTP to_address must not be empty".into()));
            }
        }

        if let Some(discord) = &self.notifications.discord {
            if Url::parse(&discord.webhook_url).is_err() {
                return Err(ConfigError::Message("Invalid Discord webhook URL".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Watch defaults after the `[watch]` section has been applied.
    pub fn watch_defaults(&self) -> Result<WatchConfig> {
        WatchConfig::default().merged(&self.watch)
    }
}

/// Persisted partial overrides of [`WatchConfig`]. Periods in minutes, lead time in hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchSettings {
    pub expiry_check_minutes: Option<u64>,
    pub restock_check_minutes: Option<u64>,
    pub restock_source: Option<String>,
    pub expiry_warning_hours: Option<u64>,
    pub similarity_threshold: Option<f64>,
}

/// Immutable snapshot handed to each reconciliation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub expiry_check_period: Duration,
    pub restock_check_period: Duration,
    /// Listings endpoint; empty means no similarity candidates.
    pub restock_source: String,
    pub expiry_warning_lead: Duration,
    pub similarity_threshold: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            expiry_check_period: Duration::from_secs(60 * 60),
            restock_check_period: Duration::from_secs(360 * 60),
            restock_source: String::new(),
            expiry_warning_lead: Duration::from_secs(24 * 60 * 60),
            similarity_threshold: 0.8,
        }
    }
}

impl WatchConfig {
    /// Applies every present override, or none of them if any is invalid.
    pub fn merged(&self, settings: &WatchSettings) -> Result<WatchConfig> {
        let mut merged = self.clone();

        if let Some(minutes) = settings.expiry_check_minutes {
            merged.expiry_check_period = minutes_to_period("expiry_check_minutes", minutes)?;
        }
        if let Some(minutes) = settings.restock_check_minutes {
            merged.restock_check_period = minutes_to_period("restock_check_minutes", minutes)?;
        }
        if let Some(hours) = settings.expiry_warning_hours {
            let secs = hours
                .checked_mul(3600)
                .ok_or_else(|| AppError::validation("expiry_warning_hours is too large"))?;
            merged.expiry_warning_lead = Duration::from_secs(secs);
        }
        if let Some(threshold) = settings.similarity_threshold {
            if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::validation(format!(
                    "similarity_threshold must be between 0 and 1, got {}",
                    threshold
                )));
            }
            merged.similarity_threshold = threshold;
        }
        if let Some(source) = &settings.restock_source {
            let source = source.trim();
            if !source.is_empty() {
                let parsed = Url::parse(source).map_err(|e| {
                    AppError::validation(format!("restock_source is not a valid URL: {}", e))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::validation("restock_source must be an http(s) URL"));
                }
            }
            merged.restock_source = source.to_string();
        }

        Ok(merged)
    }

    pub fn to_settings(&self) -> WatchSettings {
        WatchSettings {
            expiry_check_minutes: Some(self.expiry_check_period.as_secs() / 60),
            restock_check_minutes: Some(self.restock_check_period.as_secs() / 60),
            restock_source: Some(self.restock_source.clone()),
            expiry_warning_hours: Some(self.expiry_warning_lead.as_secs() / 3600),
            similarity_threshold: Some(self.similarity_threshold),
        }
    }
}

fn minutes_to_period(field: &str, minutes: u64) -> Result<Duration> {
    if minutes == 0 {
        return Err(AppError::validation(format!("{} must be greater than 0", field)));
    }
    let secs = minutes
        .checked_mul(60)
        .ok_or_else(|| AppError::validation(format!("{} is too large", field)))?;
    Ok(Duration::from_secs(secs))
}

/// Owns the current watch configuration. Reloads swap in a whole new snapshot.
pub struct ConfigStore {
    defaults: WatchConfig,
    store: Arc<dyn DealStore>,
    current: RwLock<Arc<WatchConfig>>,
}

impl ConfigStore {
    pub fn new(defaults: WatchConfig, store: Arc<dyn DealStore>) -> Self {
        let current = RwLock::new(Arc::new(defaults.clone()));
        Self {
            defaults,
            store,
            current,
        }
    }

    /// Merges persisted overrides onto the defaults. Any failure falls back to the defaults.
    pub async fn load(&self) -> Arc<WatchConfig> {
        let loaded = match self.store.settings().await {
            Ok(Some(settings)) => match self.defaults.merged(&settings) {
                Ok(config) => {
                    debug!(?settings, "Applied persisted watch settings");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Persisted watch settings are invalid, using defaults");
                    self.defaults.clone()
                }
            },
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                warn!(error = %e, "Failed to read watch settings, using defaults");
                self.defaults.clone()
            }
        };

        let snapshot = Arc::new(loaded);
        *self.current.write().await = Arc::clone(&snapshot);
        snapshot
    }

    pub async fn current(&self) -> Arc<WatchConfig> {
        Arc::clone(&*self.current.read().await)
    }

    /// Validates and persists overrides, then reloads.
    pub async fn save(&self, settings: &WatchSettings) -> Result<Arc<WatchConfig>> {
        self.defaults.merged(settings)?;
        self.store.save_settings(settings).await?;
        info!("Saved watch settings");
        Ok(self.load().await)
    }
}
