use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{ConfigStore, WatchConfig};
use crate::core::{ExpiryReconciler, ExpiryReport, RestockReconciler, RestockReport};

/// The two recurring checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Expiry,
    Restock,
}

impl Trigger {
    pub const ALL: [Trigger; 2] = [Trigger::Expiry, Trigger::Restock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Expiry => "expiry",
            Trigger::Restock => "restock",
        }
    }

    pub fn period(&self, config: &WatchConfig) -> Duration {
        match self {
            Trigger::Expiry => config.expiry_check_period,
            Trigger::Restock => config.restock_check_period,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expiry" => Ok(Trigger::Expiry),
            "restock" => Ok(Trigger::Restock),
            other => Err(format!("unknown trigger '{}', expected 'expiry' or 'restock'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "trigger", rename_all = "lowercase")]
pub enum CycleReport {
    Expiry(ExpiryReport),
    Restock(RestockReport),
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        match self {
            CycleReport::Expiry(report) => report.failures.len(),
            CycleReport::Restock(report) => report.failures.len(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            CycleReport::Expiry(r) => format!(
                "checked {}, expired {}, warned {}, malformed {}, failures {}",
                r.checked, r.expired, r.warned, r.malformed, r.failures.len()
            ),
            CycleReport::Restock(r) => format!(
                "checked {}, original url active {}, similar listings {}, failures {}",
                r.checked, r.original_url_active, r.similar_listings, r.failures.len()
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerStats {
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Fires dropped because the previous run of the same trigger was still going.
    pub skipped_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_summary: Option<String>,
    pub total_run_time_ms: u64,
}

/// Runs one cycle per fire with a fresh configuration snapshot.
pub struct CycleRunner {
    config_store: Arc<ConfigStore>,
    expiry: ExpiryReconciler,
    restock: RestockReconciler,
    expiry_guard: Mutex<()>,
    restock_guard: Mutex<()>,
    stats: RwLock<HashMap<Trigger, TriggerStats>>,
}

impl CycleRunner {
    pub fn new(config_store: Arc<ConfigStore>, expiry: ExpiryReconciler, restock: RestockReconciler) -> Self {
        Self {
            config_store,
            expiry,
            restock,
            expiry_guard: Mutex::new(()),
            restock_guard: Mutex::new(()),
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.config_store
    }

    fn guard(&self, trigger: Trigger) -> &Mutex<()> {
        match trigger {
            Trigger::Expiry => &self.expiry_guard,
            Trigger::Restock => &self.restock_guard,
        }
    }

    pub fn is_running(&self, trigger: Trigger) -> bool {
        self.guard(trigger).try_lock().is_err()
    }

    /// `Ok(None)` when a run of the same trigger is already in progress.
    pub async fn fire(&self, trigger: Trigger) -> Result<Option<CycleReport>> {
        let Ok(_running) = self.guard(trigger).try_lock() else {
            tracing::warn!(trigger = %trigger, "Previous run still in progress, skipping");
            self.stats.write().await.entry(trigger).or_default().skipped_count += 1;
            return Ok(None);
        };

        let config = self.config_store.load().await;
        tracing::debug!(trigger = %trigger, "Starting scheduled check");

        let start = Instant::now();
        let outcome = match trigger {
            Trigger::Expiry => self.expiry.run(&config).await.map(CycleReport::Expiry),
            Trigger::Restock => self.restock.run(&config).await.map(CycleReport::Restock),
        };
        let elapsed = start.elapsed();

        let mut stats = self.stats.write().await;
        let entry = stats.entry(trigger).or_default();
        entry.run_count += 1;
        entry.last_run = Some(Utc::now());
        entry.total_run_time_ms += elapsed.as_millis() as u64;

        match outcome {
            Ok(report) => {
                entry.success_count += 1;
                entry.last_error = None;
                entry.last_summary = Some(report.summary());
                tracing::info!(trigger = %trigger, summary = %report.summary(), "Completed check");
                Ok(Some(report))
            }
            Err(e) => {
                entry.error_count += 1;
                entry.last_error = Some(e.to_string());
                tracing::error!(trigger = %trigger, error = %e, "Check failed");
                Err(e.into())
            }
        }
    }

    pub async fn stats(&self, trigger: Trigger) -> TriggerStats {
        self.stats.read().await.get(&trigger).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub trigger: Trigger,
    pub period_secs: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub armed_jobs: usize,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub skipped_runs: u64,
    pub average_run_time_ms: f64,
    pub uptime_seconds: u64,
}

pub struct DealScheduler {
    scheduler: JobScheduler,
    runner: Arc<CycleRunner>,
    jobs: Arc<RwLock<HashMap<Trigger, JobInfo>>>,
    start_time: DateTime<Utc>,
}

impl DealScheduler {
    pub async fn new(runner: Arc<CycleRunner>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            runner,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            start_time: Utc::now(),
        })
    }

    pub fn runner(&self) -> &Arc<CycleRunner> {
        &self.runner
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        tracing::info!("Deal scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        tracing::info!("Deal scheduler shutdown");
        Ok(())
    }

    /// (Re)arms `trigger` to fire every `period`. Arming twice never leaves two jobs behind.
    pub async fn arm(&self, trigger: Trigger, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(anyhow::anyhow!("Period for {} must be greater than zero", trigger));
        }

        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(&trigger) {
            if existing.period_secs == period.as_secs() {
                tracing::debug!(trigger = %trigger, period_secs = period.as_secs(), "Already armed");
                return Ok(());
            }
            self.scheduler.remove(&existing.id).await?;
            jobs.remove(&trigger);
        }

        let runner = Arc::clone(&self.runner);
        let job = Job::new_repeated_async(period, move |_uuid, _l| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                if let Err(e) = runner.fire(trigger).await {
                    tracing::error!(trigger = %trigger, error = %e, "Scheduled check failed");
                }
            })
        })?;

        let id = self.scheduler.add(job).await?;
        jobs.insert(
            trigger,
            JobInfo {
                id,
                trigger,
                period_secs: period.as_secs(),
                created_at: Utc::now(),
            },
        );

        tracing::info!(trigger = %trigger, period_secs = period.as_secs(), job = %id, "Armed trigger");
        Ok(())
    }

    /// Re-arms both triggers to the periods in `config`.
    pub async fn apply(&self, config: &WatchConfig) -> Result<()> {
        for trigger in Trigger::ALL {
            self.arm(trigger, trigger.period(config)).await?;
        }
        Ok(())
    }

    /// Loads configuration and applies it.
    pub async fn reload(&self) -> Result<Arc<WatchConfig>> {
        let config = self.runner.config_store().load().await;
        self.apply(&config).await?;
        Ok(config)
    }

    pub async fn run_now(&self, trigger: Trigger) -> Result<Option<CycleReport>> {
        tracing::info!(trigger = %trigger, "Running immediate check");
        self.runner.fire(trigger).await
    }

    pub async fn armed(&self) -> Vec<(Trigger, Duration)> {
        let jobs = self.jobs.read().await;
        let mut armed: Vec<(Trigger, Duration)> = jobs
            .values()
            .map(|job| (job.trigger, Duration::from_secs(job.period_secs)))
            .collect();
        armed.sort_by_key(|(trigger, _)| *trigger);
        armed
    }

    pub async fn job_info(&self, trigger: Trigger) -> Option<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.get(&trigger).cloned()
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let armed_jobs = self.jobs.read().await.len();

        let mut completed_runs = 0;
        let mut failed_runs = 0;
        let mut skipped_runs = 0;
        let mut total_runs = 0;
        let mut total_time_ms = 0;
        for trigger in Trigger::ALL {
            let stats = self.runner.stats(trigger).await;
            completed_runs += stats.success_count;
            failed_runs += stats.error_count;
            skipped_runs += stats.skipped_count;
            total_runs += stats.run_count;
            total_time_ms += stats.total_run_time_ms;
        }

        let uptime = Utc::now().signed_duration_since(self.start_time);

        SchedulerStats {
            armed_jobs,
            completed_runs,
            failed_runs,
            skipped_runs,
            average_run_time_ms: if total_runs == 0 { 0.0 } else { total_time_ms as f64 / total_runs as f64 },
            uptime_seconds: uptime.num_seconds().max(0) as u64,
        }
    }
}
