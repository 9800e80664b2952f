use async_trait::async_trait;
use tracing::info;

use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};

/// Writes notifications to the application log. Always registered unless disabled.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &str {
        "Log Notifier"
    }

    fn plugin_type(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Records notifications in the application log"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, Box<dyn std::error::Error + Send + Sync>> {
        info!(
            notification_id = %event.id,
            kind = %event.kind,
            deal = %event.deal.title,
            url = event.target_url().unwrap_or_default(),
            "{}: {}",
            event.title,
            event.message
        );

        Ok(NotificationResult::delivered(format!("log-{}", event.id)))
    }
}
