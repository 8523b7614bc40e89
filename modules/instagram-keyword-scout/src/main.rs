use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use instagram_keyword_scout::config::ScoutConfig;
use instagram_keyword_scout::{
    export, ApifyJobService, ApifyStorage, LocalStorage, Orchestrator, RunOutcome, RunStorage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StorageKind {
    /// Platform storage when running as an actor, local directory otherwise
    Auto,
    Apify,
    Local,
}

#[derive(Parser)]
#[command(
    name = "keyword-scout",
    about = "Search Instagram for a keyword via the Apify search scraper"
)]
struct Cli {
    /// Read run input from this JSON file instead of the INPUT record
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where input is read from and results are written to
    #[arg(long, value_enum, default_value_t = StorageKind::Auto)]
    storage: StorageKind,

    /// Root of the local storage directory
    #[arg(long, env = "APIFY_LOCAL_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Abort the remote job if it runs longer than this
    #[arg(long, env = "SCOUT_RUN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Also write the run as JSON and CSV files into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("instagram_keyword_scout=info,keyword_scout=info,apify_client=info")
    });
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Instagram keyword scout starting...");

    let mut config = ScoutConfig::from_env()?;
    if let Some(dir) = cli.storage_dir.clone() {
        config.local_storage_dir = dir;
    }
    if let Some(secs) = cli.timeout_secs {
        config.run_timeout = Some(Duration::from_secs(secs));
    }

    let storage = build_storage(cli.storage, &config)?;
    let jobs = ApifyJobService::new(
        ApifyClient::new(config.apify_token.clone()).with_base_url(&config.apify_base_url),
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(Arc::new(jobs), storage)
        .with_actor_id(config.actor_id.clone())
        .with_run_timeout(config.run_timeout)
        .with_cancellation(cancel_rx);

    let outcome = run(&orchestrator, cli.input.as_deref()).await?;

    if let Some(dir) = &cli.export_dir {
        export_outcome(&outcome, dir)?;
    }
    println!("{}", export::render_summary(&outcome));

    Ok(())
}

async fn run(orchestrator: &Orchestrator, input: Option<&Path>) -> Result<RunOutcome> {
    let Some(path) = input else {
        return Ok(orchestrator.run_from_storage().await?);
    };
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let input: serde_json::Value = serde_json::from_slice(&raw)
        .with_context(|| format!("Input file {} is not valid JSON", path.display()))?;
    Ok(orchestrator.run(&input).await?)
}

fn build_storage(kind: StorageKind, config: &ScoutConfig) -> Result<Arc<dyn RunStorage>> {
    let use_platform = match kind {
        StorageKind::Apify => true,
        StorageKind::Local => false,
        StorageKind::Auto => config.on_platform(),
    };

    if !use_platform {
        info!(dir = %config.local_storage_dir.display(), "Using local storage");
        return Ok(Arc::new(LocalStorage::new(config.local_storage_dir.clone())));
    }

    let dataset_id = config
        .default_dataset_id
        .clone()
        .context("ACTOR_DEFAULT_DATASET_ID must be set for Apify storage")?;
    let store_id = config
        .default_key_value_store_id
        .clone()
        .context("ACTOR_DEFAULT_KEY_VALUE_STORE_ID must be set for Apify storage")?;
    info!(dataset_id = %dataset_id, store_id = %store_id, "Using Apify platform storage");

    let client = ApifyClient::new(config.apify_token.clone()).with_base_url(&config.apify_base_url);
    Ok(Arc::new(ApifyStorage::new(client, dataset_id, store_id)))
}

fn export_outcome(outcome: &RunOutcome, dir: &Path) -> Result<()> {
    let stem = export::file_stem(&outcome.request.keyword, chrono::Utc::now());
    let json_path = export::write_json(outcome, dir, &stem)?;
    let csv_path = export::write_csv(outcome, dir, &stem)?;
    info!(
        json = %json_path.display(),
        csv = ?csv_path,
        "Files saved"
    );
    Ok(())
}
