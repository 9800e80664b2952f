use super::*;
use chrono::{Duration, Utc};
use deal_watcher::{
    Command, CycleReport, Trigger,
    core::date_resolver::format_timestamp,
};

fn in_hours(hours: i64) -> Option<String> {
    Some(format_timestamp(Utc::now() + Duration::hours(hours)))
}

fn supertool_listings() -> Vec<Listing> {
    vec![
        Listing::new("Photo Editor Studio", "https://listings.example.com/photo"),
        Listing::new("SuperTool Pro — Lifetime License", "https://listings.example.com/supertool-v2"),
    ]
}

#[tokio::test]
async fn test_malformed_record_does_not_stop_the_batch() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    let store = harness.store.as_ref();

    let mut expired = Vec::new();
    let mut soon = Vec::new();
    for (i, hours) in [-1, -48, -3].into_iter().enumerate() {
        expired.push(seed_deal(store, &format!("Expired {}", i), "https://deals.example.com/e", in_hours(hours), DealStatus::Watching).await);
    }
    for (i, hours) in [1, 5, 23].into_iter().enumerate() {
        soon.push(seed_deal(store, &format!("Soon {}", i), "https://deals.example.com/s", in_hours(hours), DealStatus::Watching).await);
    }
    for (i, hours) in [72, 240, 720].into_iter().enumerate() {
        seed_deal(store, &format!("Later {}", i), "https://deals.example.com/l", in_hours(hours), DealStatus::Watching).await;
    }
    let malformed = seed_deal(
        store,
        "Broken",
        "https://deals.example.com/b",
        Some("next tuesday-ish".to_string()),
        DealStatus::Watching,
    )
    .await;

    let Some(CycleReport::Expiry(report)) = harness.app.scheduler.run_now(Trigger::Expiry).await? else {
        panic!("expected an expiry report");
    };

    assert_eq!(report.checked, 10);
    assert_eq!(report.expired, 3);
    assert_eq!(report.warned, 3);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].deal_id, malformed.id);

    for deal in &expired {
        assert_eq!(harness.status_of(&deal.id).await, DealStatus::Missed);
    }
    for deal in &soon {
        assert_eq!(harness.status_of(&deal.id).await, DealStatus::Watching);
    }
    assert_eq!(harness.status_of(&malformed.id).await, DealStatus::Watching);
    assert_eq!(harness.notifications_of(NotificationKind::ExpiryWarning).await.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_repeat_expiry_runs_warn_once() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    seed_deal(harness.store.as_ref(), "Soon", "https://deals.example.com/s", in_hours(2), DealStatus::Watching).await;

    harness.app.scheduler.run_now(Trigger::Expiry).await?;
    harness.app.scheduler.run_now(Trigger::Expiry).await?;

    assert_eq!(harness.notifications_of(NotificationKind::ExpiryWarning).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_warning_lost_to_outage_is_sent_next_run() -> anyhow::Result<()> {
    let flaky = FlakyNotifier::failing_first(1);
    let calls = flaky.calls.clone();
    let plugins = PluginManager::new();
    plugins.register_notifier(Box::new(flaky)).await?;
    let harness = create_harness_with_plugins(StubProber::default(), StubFetcher::default(), plugins).await?;
    let deal = seed_deal(harness.store.as_ref(), "Soon", "https://deals.example.com/s", in_hours(2), DealStatus::Watching).await;

    let Some(CycleReport::Expiry(report)) = harness.app.scheduler.run_now(Trigger::Expiry).await? else {
        panic!("expected an expiry report");
    };
    assert_eq!(report.warned, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].deal_id, deal.id);
    assert!(harness.notifications_of(NotificationKind::ExpiryWarning).await.is_empty());

    let Some(CycleReport::Expiry(report)) = harness.app.scheduler.run_now(Trigger::Expiry).await? else {
        panic!("expected an expiry report");
    };
    assert_eq!(report.warned, 1);
    assert!(report.failures.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.notifications_of(NotificationKind::ExpiryWarning).await.len(), 1);

    // Delivered once, so later runs stay quiet.
    harness.app.scheduler.run_now(Trigger::Expiry).await?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_similar_listing_alert_retried_after_outage() -> anyhow::Result<()> {
    let flaky = FlakyNotifier::failing_first(1);
    let calls = flaky.calls.clone();
    let plugins = PluginManager::new();
    plugins.register_notifier(Box::new(flaky)).await?;
    let harness = create_harness_with_plugins(
        StubProber::default(),
        StubFetcher::with_listings(supertool_listings()),
        plugins,
    )
    .await?;
    let deal = seed_deal(harness.store.as_ref(), "SuperTool Pro", "https://deals.example.com/gone", None, DealStatus::Missed).await;

    let Some(CycleReport::Restock(report)) = harness.app.scheduler.run_now(Trigger::Restock).await? else {
        panic!("expected a restock report");
    };
    assert_eq!(report.similar_listings, 0);
    assert_eq!(report.failures.len(), 1);

    let Some(CycleReport::Restock(report)) = harness.app.scheduler.run_now(Trigger::Restock).await? else {
        panic!("expected a restock report");
    };
    assert_eq!(report.similar_listings, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let alerts = harness.notifications_of(NotificationKind::SimilarNewListing).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].url.as_deref(), Some("https://listings.example.com/supertool-v2"));
    assert_eq!(harness.status_of(&deal.id).await, DealStatus::Missed);
    Ok(())
}

#[tokio::test]
async fn test_live_original_page_restores_watching() -> anyhow::Result<()> {
    let harness = create_harness(
        StubProber::with_active(&["https://deals.example.com/supertool"]),
        StubFetcher::with_listings(supertool_listings()),
    )
    .await?;
    let deal = seed_deal(
        harness.store.as_ref(),
        "SuperTool Pro Lifetime Deal",
        "https://deals.example.com/supertool",
        in_hours(-24),
        DealStatus::Missed,
    )
    .await;

    let Some(CycleReport::Restock(report)) = harness.app.scheduler.run_now(Trigger::Restock).await? else {
        panic!("expected a restock report");
    };

    assert_eq!(report.original_url_active, 1);
    assert_eq!(report.similar_listings, 0);
    assert_eq!(harness.status_of(&deal.id).await, DealStatus::Watching);
    assert_eq!(harness.notifications_of(NotificationKind::OriginalUrlActive).await.len(), 1);
    assert!(harness.notifications_of(NotificationKind::SimilarNewListing).await.is_empty());
    assert_eq!(harness.fetcher.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_similar_listing_alerts_once_and_stays_missed() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::with_listings(supertool_listings())).await?;
    let deal = seed_deal(
        harness.store.as_ref(),
        "SuperTool Pro Lifetime Deal",
        "https://deals.example.com/supertool",
        in_hours(-24),
        DealStatus::Missed,
    )
    .await;

    for _ in 0..2 {
        let Some(CycleReport::Restock(report)) = harness.app.scheduler.run_now(Trigger::Restock).await? else {
            panic!("expected a restock report");
        };
        assert_eq!(report.similar_listings, 1);
    }

    assert_eq!(harness.status_of(&deal.id).await, DealStatus::Missed);
    assert_eq!(harness.fetcher.call_count(), 2);

    let alerts = harness.notifications_of(NotificationKind::SimilarNewListing).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].deal_id.as_deref(), Some(deal.id.as_str()));

    let response = harness
        .app
        .router
        .dispatch(Command::GetNotificationUrl {
            notification_id: alerts[0].id.clone(),
        })
        .await;
    assert_eq!(
        response.data.unwrap()["url"],
        "https://listings.example.com/supertool-v2"
    );

    Ok(())
}

#[tokio::test]
async fn test_unrelated_listings_do_not_alert() -> anyhow::Result<()> {
    let harness = create_harness(
        StubProber::default(),
        StubFetcher::with_listings(vec![Listing::new("Photo Editor Studio", "https://listings.example.com/photo")]),
    )
    .await?;
    seed_deal(harness.store.as_ref(), "Budget Planner", "https://deals.example.com/budget", None, DealStatus::Missed).await;
    seed_deal(harness.store.as_ref(), "Mail Client", "", None, DealStatus::Missed).await;

    let Some(CycleReport::Restock(report)) = harness.app.scheduler.run_now(Trigger::Restock).await? else {
        panic!("expected a restock report");
    };

    assert_eq!(report.unmatched, 2);
    // Only the deal with a URL is probed; listings are fetched once for both.
    assert_eq!(harness.prober.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(harness.fetcher.call_count(), 1);
    assert!(harness.store.notifications().await.is_empty());

    Ok(())
}
