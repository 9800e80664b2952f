use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use super::DealStore;
use crate::config::{DatabaseConfig, WatchSettings};
use crate::models::{
    Deal, DealPatch, DealRow, DealStatus, NotificationKind, NotificationLog, NotificationLogRow,
    SystemSetting,
};
use crate::utils::error::{AppError, Result};

const DEAL_COLUMNS: &str = "id, title, url, expires_at, saved_at, updated_at, status, notes, extra";

pub struct SqliteDealStore {
    pool: SqlitePool,
}

impl SqliteDealStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database.
        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        debug!(url = %config.url, "Connected to SQLite");
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Rows that no longer decode are logged and left out so one bad record cannot hide the rest.
fn decode_rows(rows: Vec<DealRow>) -> Vec<Deal> {
    rows.into_iter()
        .filter_map(|row| match Deal::try_from(row) {
            Ok(deal) => Some(deal),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable deal row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl DealStore for SqliteDealStore {
    async fn deals_by_status(&self, status: DealStatus) -> Result<Vec<Deal>> {
        let rows = sqlx::query_as::<_, DealRow>(&format!(
            "SELECT {} FROM deals WHERE status = ? ORDER BY saved_at",
            DEAL_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn deal_by_id(&self, id: &str) -> Result<Option<Deal>> {
        let row = sqlx::query_as::<_, DealRow>(&format!("SELECT {} FROM deals WHERE id = ?", DEAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Deal::try_from).transpose()
    }

    async fn all_deals(&self) -> Result<Vec<Deal>> {
        let rows = sqlx::query_as::<_, DealRow>(&format!("SELECT {} FROM deals ORDER BY saved_at", DEAL_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }

    async fn add_deal(&self, deal: &Deal) -> Result<()> {
        sqlx::query(
            "INSERT INTO deals (id, title, url, expires_at, saved_at, updated_at, status, notes, extra)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&deal.id)
        .bind(&deal.title)
        .bind(&deal.url)
        .bind(&deal.expires_at)
        .bind(deal.saved_at)
        .bind(deal.updated_at)
        .bind(deal.status.as_str())
        .bind(&deal.notes)
        .bind(serde_json::to_string(&deal.extra)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_deal_status(&self, id: &str, status: DealStatus) -> Result<()> {
        let result = sqlx::query("UPDATE deals SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::deal_not_found(id));
        }
        Ok(())
    }

    async fn update_deal(&self, id: &str, patch: DealPatch) -> Result<Deal> {
        let extra = patch.extra.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE deals SET
                title = COALESCE(?, title),
                url = COALESCE(?, url),
                expires_at = COALESCE(?, expires_at),
                status = COALESCE(?, status),
                notes = COALESCE(?, notes),
                extra = COALESCE(?, extra),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(patch.title)
        .bind(patch.url)
        .bind(patch.expires_at)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.notes)
        .bind(extra)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::deal_not_found(id));
        }

        self.deal_by_id(id)
            .await?
            .ok_or_else(|| AppError::deal_not_found(id))
    }

    async fn delete_deal(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM deals WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn settings(&self) -> Result<Option<WatchSettings>> {
        let setting = sqlx::query_as::<_, SystemSetting>(
            "SELECT key, value_json FROM system_settings WHERE key = ?",
        )
        .bind(SystemSetting::WATCH_SETTINGS)
        .fetch_optional(&self.pool)
        .await?;

        match setting {
            Some(setting) => Ok(Some(setting.decode()?)),
            None => Ok(None),
        }
    }

    async fn save_settings(&self, settings: &WatchSettings) -> Result<()> {
        let setting = SystemSetting::new(SystemSetting::WATCH_SETTINGS, settings)?;

        sqlx::query(
            "INSERT INTO system_settings (key, value_json) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        )
        .bind(&setting.key)
        .bind(&setting.value_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_notification(&self, log: &NotificationLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO notification_logs (id, deal_id, kind, url, reference, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.id)
        .bind(&log.deal_id)
        .bind(log.kind.as_str())
        .bind(&log.url)
        .bind(&log.reference)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn notification_by_id(&self, id: &str) -> Result<Option<NotificationLog>> {
        let row = sqlx::query_as::<_, NotificationLogRow>(
            "SELECT id, deal_id, kind, url, reference, created_at FROM notification_logs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(NotificationLog::try_from).transpose()
    }

    async fn has_notification(
        &self,
        deal_id: &str,
        kind: NotificationKind,
        reference: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_logs WHERE deal_id = ? AND kind = ? AND reference = ?",
        )
        .bind(deal_id)
        .bind(kind.as_str())
        .bind(reference)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
