use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use deal_watcher::{
    App, AppConfig, Trigger,
    config::{LoggingConfig, MetricsConfig},
    core::{DateResolver, SimilarityScorer, date_resolver::format_timestamp},
    export::write_csv,
    storage,
    web::{self, AppState},
};

#[derive(Parser)]
#[command(name = "deal-watcher")]
#[command(version, about = "Watch limited-time deals for expiry and restocks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file layered over config/default and config/local
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the HTTP API
    Serve,
    /// Run one expiry or restock check now
    Check {
        /// expiry | restock
        trigger: Trigger,
    },
    /// Write every saved deal as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how a free-text expiry is resolved
    ResolveDate { text: String },
    /// Score two titles with the restock matcher
    Similarity {
        a: String,
        b: String,
        #[arg(short, long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Check { trigger } => check(config, trigger).await,
        Commands::Export { output } => export(config, output).await,
        Commands::ResolveDate { text } => {
            match DateResolver::new().resolve(&text) {
                Some(instant) => println!("{}", format_timestamp(instant)),
                None => println!("unresolved"),
            }
            Ok(())
        }
        Commands::Similarity { a, b, threshold } => {
            let threshold = match threshold {
                Some(t) => t,
                None => config.watch_defaults()?.similarity_threshold,
            };
            let scorer = SimilarityScorer::new();
            println!(
                "score {:.3}, similar at {:.2}: {}",
                scorer.score(&a, &b),
                threshold,
                scorer.is_similar(&a, &b, threshold)
            );
            Ok(())
        }
    }
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "deal-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("failed to install Prometheus exporter")?;
    info!(port = config.port, "Prometheus exporter listening");
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting deal watcher...");
    init_metrics(&config.metrics)?;

    let server = config.server.clone();
    let app = App::build(config).await?;
    app.start().await?;

    web::serve(&server, AppState::from_app(&app)).await?;

    info!("Shutting down...");
    app.shutdown().await
}

async fn check(config: AppConfig, trigger: Trigger) -> Result<()> {
    let app = App::build(config).await?;

    match app.scheduler.run_now(trigger).await? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => println!("{} check is already running", trigger),
    }

    app.shutdown().await
}

async fn export(config: AppConfig, output: Option<PathBuf>) -> Result<()> {
    let store = storage::connect(&config.database).await?;
    let deals = store.all_deals().await?;

    match output {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
            write_csv(file, &deals)?;
            info!(count = deals.len(), path = %path.display(), "Exported deals");
        }
        None => write_csv(io::stdout().lock(), &deals)?,
    }

    Ok(())
}
