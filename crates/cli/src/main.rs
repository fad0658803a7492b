// crates/cli/src/main.rs
//! Command-line entry point: wires config, store, LLM layer and the
//! pipeline driver together. All real logic lives in the library crates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nomenorm_core::kpved::ClassifierTree;
use nomenorm_core::{
    BatcherConfig, ClassifierLookup, CoordinatorConfig, HierarchicalClassifier, HttpProvider,
    LlmCoordinator, PipelineConfig, RetryPolicy, Validator,
};
use nomenorm_db::{Database, RawTableSpec, StoreLookup};
use nomenorm_pipeline::{progress, run_quality_pass, PipelineDriver};

#[derive(Parser)]
#[command(name = "nomenorm", about = "Catalog normalization and KPVED classification pipeline")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "nomenorm.toml")]
    config: PathBuf,

    /// Path to the SQLite database.
    #[arg(long, global = true, default_value = "nomenorm.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the normalization pipeline over the raw table.
    Run {
        /// Upload id for checkpointing; generated when omitted.
        #[arg(long)]
        upload_id: Option<String>,
    },
    /// Re-score persisted items and promote benchmark-tier rows.
    Quality,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        PipelineConfig::from_file(&cli.config)
            .with_context(|| format!("loading config {}", cli.config.display()))?
    } else {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
        PipelineConfig::default()
    };
    let db = Database::new(&cli.db).await.context("opening database")?;

    match cli.command {
        Command::Run { upload_id } => run_pipeline(db, config, upload_id).await,
        Command::Quality => run_quality(db, config).await,
    }
}

async fn run_pipeline(
    db: Database,
    config: PipelineConfig,
    upload_id: Option<String>,
) -> Result<()> {
    let upload_id = upload_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let cancel = CancellationToken::new();

    // Ctrl-C triggers the graceful shutdown path: queued LLM work drains,
    // a final checkpoint lands, the run ends as failed/resumable.
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            ctrl_c_cancel.cancel();
        }
    });

    let (progress_tx, mut progress_rx) = progress::channel(64);
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("static template"));
    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(message) = progress_rx.recv().await {
                bar.set_message(message);
                bar.tick();
            }
        })
    };

    let mut driver = PipelineDriver::new(db.clone(), config.clone())
        .with_progress(progress_tx)
        .with_cancellation(cancel.clone());

    // Time-series sampler for external graphing; dies with the run.
    let series = nomenorm_core::StatsTimeSeries::new(360);
    let sampler = nomenorm_core::spawn_sampler(
        driver.stats(),
        series.clone(),
        std::time::Duration::from_secs(config.stats_interval_secs.max(1)),
        cancel.clone(),
    );

    if config.ai.enabled {
        let stats = driver.stats();
        let api_key = config.ai.api_key.clone().unwrap_or_default();
        let provider = HttpProvider::new(
            &config.ai.base_url,
            api_key,
            config.ai.model.clone(),
            config.ai.request_timeout_secs,
        )
        .context("building LLM provider")?;

        let coordinator = Arc::new(LlmCoordinator::new(
            Arc::new(provider),
            CoordinatorConfig {
                retry: RetryPolicy {
                    max_retries: config.ai.max_retries,
                    delay: config.ai.rate_limit_delay(),
                },
                cache_capacity: config.ai.cache_capacity,
                batch: config.ai.batch.enabled.then(|| BatcherConfig {
                    size: config.ai.batch.size,
                    flush_interval: config.ai.batch.flush_interval(),
                }),
            },
            stats.clone(),
            cancel.clone(),
        ));

        let records = db
            .load_classifier_records()
            .await
            .context("loading classifier tree")?;
        let tree = Arc::new(ClassifierTree::from_records(records).context("building classifier tree")?);
        let lookup: Arc<dyn ClassifierLookup> = Arc::new(StoreLookup::new(db.clone()));
        let classifier = Arc::new(HierarchicalClassifier::new(
            tree,
            coordinator.clone(),
            lookup,
            stats,
        ));
        driver = driver.with_ai(coordinator, classifier);
    }

    let stats = driver.stats();
    let summary = driver.run(&upload_id, &RawTableSpec::default()).await?;
    bar.finish_and_clear();
    bar_task.abort();
    cancel.cancel();
    let _ = sampler.await;
    tracing::debug!(samples = series.len(), "stats time series collected");

    println!(
        "run {}: {} processed, {} persisted, {} merged, {} groups in {} ms",
        summary.upload_id,
        summary.processed,
        summary.persisted,
        summary.merged_duplicates,
        summary.groups,
        summary.duration_ms
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&stats.snapshot()).context("serializing stats")?
    );
    Ok(())
}

async fn run_quality(db: Database, config: PipelineConfig) -> Result<()> {
    let stats = nomenorm_core::StatsCollector::new();
    let report = run_quality_pass(
        &db,
        &Validator::new(),
        &stats,
        config.benchmark_threshold,
        config.batch_size as i64,
    )
    .await
    .context("quality pass")?;
    println!(
        "quality pass: {} scored, {} promoted, mean score {:.3}",
        report.scored, report.promoted, report.mean_score
    );
    Ok(())
}
