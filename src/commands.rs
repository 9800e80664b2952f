//! The command surface shared by the HTTP API and the CLI.
//!
//! Every command resolves to a single [`CommandResponse`]. Failures never change state and are
//! reported with a stable `code` taken from [`AppError::code`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::{ConfigStore, WatchSettings};
use crate::core::DateResolver;
use crate::core::date_resolver::{format_timestamp, parse_timestamp};
use crate::export::{export_csv, export_filename};
use crate::models::{Deal, DealPatch, DealStatus, NewDeal};
use crate::notifier::Notifier;
use crate::scheduler::{DealScheduler, Trigger};
use crate::storage::DealStore;
use crate::utils::error::{AppError, Result};

pub const CHECK_IN_PROGRESS: &str = "CHECK_IN_PROGRESS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    SaveDeal(NewDeal),
    MarkAsMissed {
        id: String,
    },
    DeleteDeal {
        id: String,
    },
    UpdateDealNotes {
        id: String,
        #[serde(default)]
        notes: String,
    },
    GetDeal {
        id: String,
    },
    GetWatchlist,
    GetAllDeals,
    ExportCsv,
    RefreshConfig,
    GetSettings,
    SaveSettings {
        settings: WatchSettings,
    },
    RunCheck {
        trigger: Trigger,
    },
    #[serde(rename_all = "camelCase")]
    GetNotificationUrl {
        notification_id: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SaveDeal(_) => "saveDeal",
            Command::MarkAsMissed { .. } => "markAsMissed",
            Command::DeleteDeal { .. } => "deleteDeal",
            Command::UpdateDealNotes { .. } => "updateDealNotes",
            Command::GetDeal { .. } => "getDeal",
            Command::GetWatchlist => "getWatchlist",
            Command::GetAllDeals => "getAllDeals",
            Command::ExportCsv => "exportCsv",
            Command::RefreshConfig => "refreshConfig",
            Command::GetSettings => "getSettings",
            Command::SaveSettings { .. } => "saveSettings",
            Command::RunCheck { .. } => "runCheck",
            Command::GetNotificationUrl { .. } => "getNotificationUrl",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            code: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
            code: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            code: Some(code.into()),
        }
    }
}

impl From<&AppError> for CommandResponse {
    fn from(err: &AppError) -> Self {
        CommandResponse::failure(err.code(), err.to_string())
    }
}

pub struct CommandRouter {
    store: Arc<dyn DealStore>,
    notifier: Arc<dyn Notifier>,
    config_store: Arc<ConfigStore>,
    scheduler: Arc<DealScheduler>,
    resolver: DateResolver,
}

impl CommandRouter {
    pub fn new(
        store: Arc<dyn DealStore>,
        notifier: Arc<dyn Notifier>,
        config_store: Arc<ConfigStore>,
        scheduler: Arc<DealScheduler>,
    ) -> Self {
        Self {
            store,
            notifier,
            config_store,
            scheduler,
            resolver: DateResolver::new(),
        }
    }

    pub async fn dispatch(&self, command: Command) -> CommandResponse {
        let name = command.name();
        debug!(command = name, "Dispatching command");

        match self.execute(command).await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = name, error = %e, "Command failed");
                CommandResponse::from(&e)
            }
        }
    }

    async fn execute(&self, command: Command) -> Result<CommandResponse> {
        match command {
            Command::SaveDeal(new_deal) => self.save_deal(new_deal).await,
            Command::MarkAsMissed { id } => {
                let id = required_id(&id)?;
                self.store.update_deal_status(id, DealStatus::Missed).await?;
                info!(deal_id = %id, "Deal marked as missed");
                let deal = self.store.deal_by_id(id).await?;
                Ok(CommandResponse::ok_with_message("Deal marked as missed", Some(json!(deal))))
            }
            Command::DeleteDeal { id } => {
                let id = required_id(&id)?;
                if !self.store.delete_deal(id).await? {
                    return Err(AppError::deal_not_found(id));
                }
                info!(deal_id = %id, "Deal deleted");
                Ok(CommandResponse::ok_with_message("Deal deleted", None))
            }
            Command::UpdateDealNotes { id, notes } => {
                let id = required_id(&id)?;
                let patch = DealPatch {
                    notes: Some(notes.trim().to_string()),
                    ..Default::default()
                };
                let deal = self.store.update_deal(id, patch).await?;
                Ok(CommandResponse::ok_with_message("Notes updated", Some(json!(deal))))
            }
            Command::GetDeal { id } => {
                let id = required_id(&id)?;
                let deal = self
                    .store
                    .deal_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::deal_not_found(id))?;
                Ok(CommandResponse::ok(json!(deal)))
            }
            Command::GetWatchlist => {
                let deals = self.store.deals_by_status(DealStatus::Watching).await?;
                Ok(CommandResponse::ok(json!(deals)))
            }
            Command::GetAllDeals => {
                let deals = self.store.all_deals().await?;
                Ok(CommandResponse::ok(json!(deals)))
            }
            Command::ExportCsv => {
                let deals = self.store.all_deals().await?;
                let content = export_csv(&deals);
                Ok(CommandResponse::ok(json!({
                    "filename": export_filename(Utc::now()),
                    "count": deals.len(),
                    "content": content,
                })))
            }
            Command::RefreshConfig => {
                let config = self
                    .scheduler
                    .reload()
                    .await
                    .map_err(|e| AppError::Scheduler(e.to_string()))?;
                Ok(CommandResponse::ok_with_message(
                    "Configuration reloaded",
                    Some(json!(config.to_settings())),
                ))
            }
            Command::GetSettings => {
                let config = self.config_store.current().await;
                Ok(CommandResponse::ok(json!(config.to_settings())))
            }
            Command::SaveSettings { settings } => {
                let config = self.config_store.save(&settings).await?;
                self.scheduler
                    .apply(&config)
                    .await
                    .map_err(|e| AppError::Scheduler(e.to_string()))?;
                Ok(CommandResponse::ok_with_message(
                    "Settings saved",
                    Some(json!(config.to_settings())),
                ))
            }
            Command::RunCheck { trigger } => {
                let report = self
                    .scheduler
                    .run_now(trigger)
                    .await
                    .map_err(|e| AppError::Scheduler(e.to_string()))?;
                match report {
                    Some(report) => Ok(CommandResponse::ok_with_message(report.summary(), Some(json!(report)))),
                    None => Ok(CommandResponse::failure(
                        CHECK_IN_PROGRESS,
                        format!("{} check is already running", trigger),
                    )),
                }
            }
            Command::GetNotificationUrl { notification_id } => {
                let id = required_id(&notification_id)?;
                let url = self
                    .notifier
                    .deal_url_from_notification_id(id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("notification {}", id)))?;
                Ok(CommandResponse::ok(json!({ "url": url })))
            }
        }
    }

    async fn save_deal(&self, mut new_deal: NewDeal) -> Result<CommandResponse> {
        new_deal.title = new_deal.title.trim().to_string();
        new_deal.url = new_deal.url.trim().to_string();
        new_deal.validate()?;

        let expires_at = self.normalize_expiry(&new_deal);
        let deal = Deal::new(new_deal, expires_at);
        self.store.add_deal(&deal).await?;
        info!(deal_id = %deal.id, title = %deal.title, expires_at = ?deal.expires_at, "Deal saved");

        if let Err(e) = self.notifier.show_save_confirmation(&deal.title).await {
            warn!(deal_id = %deal.id, error = %e, "Save confirmation was not delivered");
        }

        Ok(CommandResponse::ok_with_message(
            format!("Saved \"{}\"", deal.title),
            Some(json!(deal)),
        ))
    }

    /// Stored expiry for a new deal. Unreadable `expiresAt` values are kept verbatim.
    fn normalize_expiry(&self, new_deal: &NewDeal) -> Option<String> {
        let explicit = new_deal.expires_at.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(raw) = explicit {
            return match parse_timestamp(raw).or_else(|| self.resolver.resolve(raw)) {
                Some(instant) => Some(format_timestamp(instant)),
                None => {
                    warn!(expires_at = raw, "Keeping unparseable expiry as given");
                    Some(raw.to_string())
                }
            };
        }

        let text = new_deal.expiry_text.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let resolved = self.resolver.resolve(text).map(format_timestamp);
        if resolved.is_none() {
            warn!(expiry_text = text, "Could not resolve expiry text");
        }
        resolved
    }
}

fn required_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::validation("id is required"));
    }
    Ok(id)
}
