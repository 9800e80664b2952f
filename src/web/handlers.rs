use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiReply, ApiResponse, AppState};
use crate::commands::Command;
use crate::config::WatchSettings;
use crate::models::NewDeal;
use crate::scheduler::Trigger;

#[derive(Debug, Serialize, Deserialize)]
pub struct NotesBody {
    #[serde(default)]
    pub notes: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "deal-watcher",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn run_command(State(state): State<AppState>, Json(command): Json<Command>) -> ApiReply {
    state.router.dispatch(command).await.into()
}

pub async fn list_deals(State(state): State<AppState>) -> ApiReply {
    state.router.dispatch(Command::GetAllDeals).await.into()
}

pub async fn watchlist(State(state): State<AppState>) -> ApiReply {
    state.router.dispatch(Command::GetWatchlist).await.into()
}

pub async fn create_deal(State(state): State<AppState>, Json(new_deal): Json<NewDeal>) -> ApiReply {
    ApiReply::from(state.router.dispatch(Command::SaveDeal(new_deal)).await).created()
}

pub async fn get_deal(State(state): State<AppState>, Path(id): Path<String>) -> ApiReply {
    state.router.dispatch(Command::GetDeal { id }).await.into()
}

pub async fn delete_deal(State(state): State<AppState>, Path(id): Path<String>) -> ApiReply {
    state.router.dispatch(Command::DeleteDeal { id }).await.into()
}

pub async fn update_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NotesBody>,
) -> ApiReply {
    state
        .router
        .dispatch(Command::UpdateDealNotes { id, notes: body.notes })
        .await
        .into()
}

pub async fn mark_missed(State(state): State<AppState>, Path(id): Path<String>) -> ApiReply {
    state.router.dispatch(Command::MarkAsMissed { id }).await.into()
}

/// The watchlist as a CSV download.
pub async fn export_csv(State(state): State<AppState>) -> Response {
    let response = state.router.dispatch(Command::ExportCsv).await;
    if !response.success {
        return ApiReply::from(response).into_response();
    }

    let data = response.data.unwrap_or_default();
    let filename = data["filename"].as_str().unwrap_or("deal-watchlist.csv").to_string();
    let content = data["content"].as_str().unwrap_or_default().to_string();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        content,
    )
        .into_response()
}

pub async fn get_settings(State(state): State<AppState>) -> ApiReply {
    state.router.dispatch(Command::GetSettings).await.into()
}

pub async fn save_settings(State(state): State<AppState>, Json(settings): Json<WatchSettings>) -> ApiReply {
    state.router.dispatch(Command::SaveSettings { settings }).await.into()
}

pub async fn refresh_settings(State(state): State<AppState>) -> ApiReply {
    state.router.dispatch(Command::RefreshConfig).await.into()
}

pub async fn run_check(State(state): State<AppState>, Path(trigger): Path<String>) -> ApiReply {
    match trigger.parse::<Trigger>() {
        Ok(trigger) => state.router.dispatch(Command::RunCheck { trigger }).await.into(),
        Err(message) => ApiReply::bad_request(message),
    }
}

pub async fn notification_url(State(state): State<AppState>, Path(notification_id): Path<String>) -> ApiReply {
    state
        .router
        .dispatch(Command::GetNotificationUrl { notification_id })
        .await
        .into()
}

pub async fn scheduler_stats(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let stats = state.scheduler.get_stats().await;
    let mut triggers = serde_json::Map::new();
    for trigger in Trigger::ALL {
        triggers.insert(
            trigger.to_string(),
            json!({
                "job": state.scheduler.job_info(trigger).await,
                "stats": state.scheduler.runner().stats(trigger).await,
                "running": state.scheduler.runner().is_running(trigger),
            }),
        );
    }

    Json(ApiResponse::success(json!({
        "scheduler": stats,
        "triggers": triggers,
    })))
}
