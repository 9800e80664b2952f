use super::*;
use deal_watcher::{Command, Trigger};
use std::time::Duration;

#[tokio::test]
async fn test_overlapping_fire_of_same_trigger_is_skipped() -> anyhow::Result<()> {
    let store = Arc::new(GatedStore::new());
    let app = create_gated_app(store.clone()).await?;

    let scheduler = Arc::clone(&app.scheduler);
    let first = tokio::spawn(async move { scheduler.run_now(Trigger::Expiry).await });

    // The first run is now parked inside the watchlist query.
    store.entered.notified().await;
    assert!(app.scheduler.runner().is_running(Trigger::Expiry));

    assert!(app.scheduler.run_now(Trigger::Expiry).await?.is_none());
    // Restock only reads missed deals, so it is not held up by the gate.
    assert!(app.scheduler.run_now(Trigger::Restock).await?.is_some());

    store.gate.add_permits(1);
    let report = first.await??;
    assert!(report.is_some());

    let stats = app.scheduler.runner().stats(Trigger::Expiry).await;
    assert_eq!(stats.run_count, 1);
    assert_eq!(stats.skipped_count, 1);
    assert!(!app.scheduler.runner().is_running(Trigger::Expiry));

    Ok(())
}

#[tokio::test]
async fn test_refresh_rearms_with_persisted_periods() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    harness.app.start().await?;

    assert_eq!(
        harness.app.scheduler.armed().await,
        vec![
            (Trigger::Expiry, Duration::from_secs(60 * 60)),
            (Trigger::Restock, Duration::from_secs(360 * 60)),
        ]
    );
    let original = harness.app.scheduler.job_info(Trigger::Expiry).await.expect("armed");

    harness
        .store
        .save_settings(&WatchSettings {
            expiry_check_minutes: Some(5),
            ..Default::default()
        })
        .await?;
    let response = harness.app.router.dispatch(Command::RefreshConfig).await;
    assert!(response.success);

    let armed = harness.app.scheduler.armed().await;
    assert_eq!(armed.len(), 2);
    assert_eq!(armed[0], (Trigger::Expiry, Duration::from_secs(5 * 60)));
    assert_ne!(harness.app.scheduler.job_info(Trigger::Expiry).await.expect("armed").id, original.id);

    // Applying the same configuration again is a no-op.
    let restock_job = harness.app.scheduler.job_info(Trigger::Restock).await.expect("armed");
    harness.app.router.dispatch(Command::RefreshConfig).await;
    assert_eq!(harness.app.scheduler.job_info(Trigger::Restock).await.expect("armed").id, restock_job.id);
    assert_eq!(harness.app.scheduler.get_stats().await.armed_jobs, 2);

    harness.app.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_persisted_settings_fall_back_to_defaults() -> anyhow::Result<()> {
    let harness = create_harness(StubProber::default(), StubFetcher::default()).await?;
    harness
        .store
        .save_settings(&WatchSettings {
            expiry_check_minutes: Some(10),
            similarity_threshold: Some(7.0),
            ..Default::default()
        })
        .await?;

    let config = harness.app.config_store.load().await;

    // All or nothing: the valid period is not applied either.
    assert_eq!(config.expiry_check_period, Duration::from_secs(60 * 60));
    assert_eq!(config.similarity_threshold, 0.8);
    assert_eq!(config.restock_source, LISTING_SOURCE);
    Ok(())
}
