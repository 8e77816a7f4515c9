pub mod assembler;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod mapping;
pub mod pool;
pub mod router;
pub mod source;
pub mod store;
pub mod summary;
pub mod writer;

use std::{env, sync::OnceLock, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::Config,
    loader::Loader,
    store::SqliteStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Checkpoint(args) => handle_checkpoint(&args),
    }
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let started = Instant::now();
    let mut config = Config::load(&args.config)?;
    if let Some(path) = &args.database {
        config.store.path = path.clone();
    }
    if let Some(size) = args.batch_size {
        config.task.batch_size = size;
    }
    debug!("Effective configuration: {config:?}");

    let store = SqliteStore::open(&config.store.path)
        .with_context(|| format!("Opening database {:?}", config.store.path))?;
    info!(
        "Loading '{}' into {:?} (table {}, batch size {})",
        args.data.display(),
        config.store.path,
        config.task.table_name,
        config.task.batch_size
    );
    let loader = Loader::new(config.task, Box::new(store), &args.logs)
        .context("Invalid task configuration")?;
    loader.prepare_tables()?;

    let summary = loader.load_path(&args.data)?;
    let elapsed = started.elapsed();
    info!(
        "Run complete: {} file(s), {} row(s) inserted in {:.3}s",
        summary.files.len(),
        summary.rows_inserted(),
        elapsed.as_secs_f64()
    );
    print!("{}", summary::render_run_summary(&summary, elapsed));
    Ok(())
}

fn handle_checkpoint(args: &cli::CheckpointArgs) -> Result<()> {
    let line = checkpoint::last_processed_line(&args.logs, &args.file, None);
    match checkpoint::find_latest_log(&args.logs, &args.file, None) {
        Some(path) => info!("Checkpoint for {} read from {path:?}", args.file),
        None => info!("No progress log for {} under {:?}", args.file, args.logs),
    }
    println!("{line}");
    Ok(())
}
