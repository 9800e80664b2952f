use super::*;
use chrono::{Datelike, Local, Timelike};
use deal_watcher::{Command, core::date_resolver::parse_timestamp};
use serde_json::json;

async fn dispatch_json(harness: &TestHarness, value: serde_json::Value) -> deal_watcher::CommandResponse {
    let command: Command = serde_json::from_value(value).expect("valid command");
    harness.app.router.dispatch(command).await
}

#[tokio::test]
async fn test_save_deal_with_free_text_expiry() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;

    let response = dispatch_json(
        &harness,
        json!({
            "action": "saveDeal",
            "title": "SuperTool Pro",
            "url": "https://deals.example.com/supertool",
            "expiryText": "Deal ends tomorrow",
            "extra": {"price": "$49"}
        }),
    )
    .await;
    assert!(response.success, "{:?}", response);

    let deals = harness.store.all_deals().await?;
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].extra["price"], "$49");

    let expiry = parse_timestamp(deals[0].expires_at.as_deref().expect("expiry stored")).expect("stored as RFC 3339");
    let local = expiry.with_timezone(&Local);
    let tomorrow = Local::now().date_naive().succ_opt().expect("tomorrow exists");
    assert_eq!(local.date_naive(), tomorrow);
    assert_eq!((local.hour(), local.minute(), local.second()), (23, 59, 59));
    assert_eq!(local.day(), tomorrow.day());

    assert_eq!(harness.notifications_of(NotificationKind::SaveConfirmation).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_save_is_rejected_without_side_effects() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;

    let response = dispatch_json(&harness, json!({"action": "saveDeal", "url": "https://deals.example.com/x"})).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("VALIDATION_ERROR"));
    assert!(harness.store.all_deals().await?.is_empty());
    assert!(harness.store.notifications().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_watchlist_lifecycle() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;

    let saved = dispatch_json(
        &harness,
        json!({"action": "saveDeal", "title": "Alpha, the \"notes\" app", "url": "https://deals.example.com/alpha"}),
    )
    .await;
    let id = saved.data.expect("saved deal")["id"].as_str().expect("id").to_string();
    dispatch_json(&harness, json!({"action": "saveDeal", "title": "Beta", "url": "https://deals.example.com/beta"})).await;

    let missed = dispatch_json(&harness, json!({"action": "markAsMissed", "id": id})).await;
    assert!(missed.success);

    let watchlist = dispatch_json(&harness, json!({"action": "getWatchlist"})).await;
    let watching = watchlist.data.expect("deals");
    assert_eq!(watching.as_array().expect("array").len(), 1);
    assert_eq!(watching[0]["title"], "Beta");

    let export = dispatch_json(&harness, json!({"action": "exportCsv"})).await.data.expect("csv");
    let content = export["content"].as_str().expect("content");
    assert!(content.starts_with("id,title,url,status,expires_at,saved_at,notes\n"));
    assert!(content.contains("\"Alpha, the \"\"notes\"\" app\""));
    assert_eq!(content.lines().count(), 3);

    let deleted = dispatch_json(&harness, json!({"action": "deleteDeal", "id": id})).await;
    assert!(deleted.success);
    let again = dispatch_json(&harness, json!({"action": "deleteDeal", "id": id})).await;
    assert_eq!(again.code.as_deref(), Some("NOT_FOUND"));

    Ok(())
}

#[tokio::test]
async fn test_manual_check_via_command() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    seed_deal(harness.store.as_ref(), "Old", "https://deals.example.com/old", Some("2020-01-01T00:00:00Z".to_string()), DealStatus::Watching).await;

    let response = dispatch_json(&harness, json!({"action": "runCheck", "trigger": "expiry"})).await;

    assert!(response.success);
    let data = response.data.expect("report");
    assert_eq!(data["trigger"], "expiry");
    assert_eq!(data["expired"], 1);
    Ok(())
}
