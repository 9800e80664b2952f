use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::App;
use crate::commands::CommandRouter;
use crate::config::ServerConfig;
use crate::scheduler::DealScheduler;

pub mod handlers;
pub mod responses;

pub use handlers::*;
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<CommandRouter>,
    pub scheduler: Arc<DealScheduler>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(router: Arc<CommandRouter>, scheduler: Arc<DealScheduler>) -> Self {
        Self {
            router,
            scheduler,
            started_at: Instant::now(),
        }
    }

    pub fn from_app(app: &App) -> Self {
        Self::new(Arc::clone(&app.router), Arc::clone(&app.scheduler))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/commands", post(run_command))
        // Deals
        .route("/deals", get(list_deals).post(create_deal))
        .route("/deals/:id", get(get_deal).delete(delete_deal))
        .route("/deals/:id/notes", put(update_notes))
        .route("/deals/:id/missed", post(mark_missed))
        .route("/watchlist", get(watchlist))
        .route("/export.csv", get(export_csv))
        // Settings and checks
        .route("/settings", get(get_settings).put(save_settings))
        .route("/settings/refresh", post(refresh_settings))
        .route("/checks/:trigger", post(run_check))
        .route("/scheduler", get(scheduler_stats))
        .route("/notifications/:id/url", get(notification_url))
}

pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server starting on {}:{}", config.host, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
