use super::*;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use deal_watcher::web::{AppState, create_router};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn create_test_router() -> anyhow::Result<(Router, TestHarness)> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    let router = create_router(AppState::from_app(&harness.app));
    Ok((router, harness))
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn test_health_endpoint() -> anyhow::Result<()> {
    let (router, _harness) = create_test_router().await?;

    let (status, body) = send(&router, Method::GET, "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "deal-watcher");
    Ok(())
}

#[tokio::test]
async fn test_deal_crud_endpoints() -> anyhow::Result<()> {
    let (router, _harness) = create_test_router().await?;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/deals",
        Some(json!({
            "title": "SuperTool Pro",
            "url": "https://deals.example.com/supertool",
            "expiresAt": "2030-06-01T12:00:00Z"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "watching");
    assert_eq!(body["data"]["expiresAt"], "2030-06-01T12:00:00.000Z");
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, body) = send(&router, Method::GET, &format!("/api/v1/deals/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "SuperTool Pro");

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/api/v1/deals/{}/notes", id),
        Some(json!({"notes": "ask about team seats"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notes"], "ask about team seats");

    let (status, _) = send(&router, Method::POST, &format!("/api/v1/deals/{}/missed", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&router, Method::GET, "/api/v1/watchlist", None).await?;
    assert_eq!(body["data"], json!([]));
    let (_, body) = send(&router, Method::GET, "/api/v1/deals", None).await?;
    assert_eq!(body["data"][0]["status"], "missed");

    let (status, _) = send(&router, Method::DELETE, &format!("/api/v1/deals/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&router, Method::GET, &format!("/api/v1/deals/{}", id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_command_endpoint_validation() -> anyhow::Result<()> {
    let (router, _harness) = create_test_router().await?;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/commands",
        Some(json!({"action": "saveDeal", "title": "No URL"})),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&router, Method::POST, "/api/v1/commands", Some(json!({"action": "getAllDeals"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_export_csv_download() -> anyhow::Result<()> {
    let (router, harness) = create_test_router().await?;
    seed_deal(harness.store.as_ref(), "Alpha", "https://deals.example.com/alpha", None, DealStatus::Watching).await;

    let request = Request::builder().uri("/api/v1/export.csv").body(Body::empty())?;
    let response = router.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str()?.to_string();
    assert!(disposition.starts_with("attachment; filename=\"deal-watchlist-"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let content = String::from_utf8(bytes.to_vec())?;
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains(",Alpha,https://deals.example.com/alpha,watching,"));
    Ok(())
}

#[tokio::test]
async fn test_settings_and_checks_endpoints() -> anyhow::Result<()> {
    let (router, _harness) = create_test_router().await?;

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/v1/settings",
        Some(json!({"restock_check_minutes": 30, "expiry_warning_hours": 6})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["restock_check_minutes"], 30);

    let (_, body) = send(&router, Method::GET, "/api/v1/settings", None).await?;
    assert_eq!(body["data"]["expiry_warning_hours"], 6);
    assert_eq!(body["data"]["restock_source"], LISTING_SOURCE);

    let (status, body) = send(&router, Method::PUT, "/api/v1/settings", Some(json!({"expiry_check_minutes": 0}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&router, Method::POST, "/api/v1/checks/restock", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trigger"], "restock");

    let (status, _) = send(&router, Method::POST, "/api/v1/checks/hourly", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, Method::GET, "/api/v1/scheduler", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scheduler"]["armed_jobs"], 2);
    assert_eq!(body["data"]["triggers"]["restock"]["stats"]["run_count"], 1);

    let (status, _) = send(&router, Method::GET, "/api/v1/notifications/unknown/url", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
