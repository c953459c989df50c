//! cmap-dp - Document Processing service
//!
//! Batch runner for the CMAP annotation pipeline: resolves configuration,
//! opens the document store, and runs each configured stage pass to
//! completion.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cmap_common::config::{resolve_database_path, resolve_log_level, TomlConfig};
use cmap_dp::config::parse_stages;
use cmap_dp::pipeline::{Pipeline, DEFAULT_WORKERS};

#[derive(Debug, Parser)]
#[command(name = "cmap-dp", about = "CMAP document-processing pipeline")]
struct Args {
    /// Config file path (default: discovered platform config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Document store path (overrides config and CMAP_DATABASE)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Log level (overrides config and CMAP_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Only run the named stages (repeatable; default: all configured)
    #[arg(long = "stage")]
    stages: Vec<String>,

    /// Override every stage's item limit
    #[arg(long)]
    max_items: Option<u32>,

    /// Number of concurrent document workers
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TomlConfig::load(path)?,
        None => TomlConfig::discover(),
    };

    let log_level = resolve_log_level(args.log_level.as_deref(), &config);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting cmap-dp (Document Processing)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Document store: {}", db_path.display());
    let pool = cmap_common::db::init_pool(&db_path).await?;
    info!("Document store connection established");

    let mut stages = parse_stages(&config)?;
    if !args.stages.is_empty() {
        stages.retain(|stage| args.stages.contains(&stage.name));
        for requested in &args.stages {
            if !stages.iter().any(|stage| &stage.name == requested) {
                warn!(stage = %requested, "Requested stage is not configured");
            }
        }
    }
    if let Some(max_items) = args.max_items {
        for stage in &mut stages {
            stage.max_items = max_items;
        }
    }
    if stages.is_empty() {
        warn!("No stages to run");
        return Ok(());
    }

    let workers = args
        .workers
        .or(config.workers)
        .unwrap_or(DEFAULT_WORKERS);
    let pipeline = Pipeline::new(pool, workers);

    for stage in &stages {
        let summary = pipeline.run_stage(stage).await?;
        info!(
            stage = %summary.stage,
            fetched = summary.fetched,
            processed = summary.processed,
            failed = summary.failed,
            "Stage finished"
        );
    }

    Ok(())
}
