use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::notifiers::{DiscordNotifier, EmailNotifier, LogNotifier};
use super::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::AppError;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<HashMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers the channels enabled in `config`.
    pub async fn from_config(config: &NotificationsConfig, client: reqwest::Client) -> Result<Self, AppError> {
        let manager = Self::new();

        if config.log_enabled {
            manager.register_notifier(Box::new(LogNotifier::new())).await?;
        }
        if let Some(discord) = &config.discord {
            manager
                .register_notifier(Box::new(DiscordNotifier::new(client, discord.clone())))
                .await?;
        }
        if let Some(smtp) = &config.smtp {
            manager
                .register_notifier(Box::new(EmailNotifier::new(smtp.clone())?))
                .await?;
        }

        Ok(manager)
    }

    /// Register a notifier plugin
    pub async fn register_notifier(&self, plugin: NotifierPluginBox) -> Result<(), AppError> {
        let plugin_type = plugin.plugin_type().to_string();

        let mut notifiers = self.notifiers.write().await;
        if notifiers.contains_key(&plugin_type) {
            return Err(AppError::Notification(format!("Notifier '{}' is already registered", plugin_type)));
        }
        tracing::debug!(plugin = %plugin.name(), "Registered notifier");
        notifiers.insert(plugin_type, plugin);
        Ok(())
    }

    /// Check if a notifier plugin exists
    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(plugin_type)
    }

    /// List all available notifier types
    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        let mut types: Vec<String> = notifiers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Sends `event` through every registered channel concurrently.
    pub async fn dispatch(&self, event: &NotificationEvent) -> Vec<(String, Result<NotificationResult, AppError>)> {
        let notifiers = self.notifiers.read().await;

        let sends = notifiers.iter().map(|(plugin_type, notifier)| async move {
            let outcome = notifier
                .notify(event)
                .await
                .map_err(|e| AppError::Notification(format!("Notifier {} failed: {}", plugin_type, e)));
            (plugin_type.clone(), outcome)
        });

        let results = futures::future::join_all(sends).await;
        for (plugin_type, outcome) in &results {
            match outcome {
                Ok(result) if !result.success => {
                    tracing::warn!(plugin = %plugin_type, error = ?result.error, "Notification not delivered");
                }
                Err(e) => tracing::warn!(plugin = %plugin_type, error = %e, "Notification failed"),
                _ => {}
            }
        }
        results
    }

    /// Shutdown all plugins
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut notifiers = self.notifiers.write().await;
        for (_, plugin) in notifiers.drain() {
            if let Err(e) = plugin.shutdown().await {
                tracing::warn!("Error shutting down notifier plugin: {}", e);
            }
        }

        Ok(())
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
