use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bulk-load csv, txt and xlsx files into SQLite tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load every supported file under a directory (or one file) into the configured tables
    Load(LoadArgs),
    /// Print the line a file would resume after, recovered from its latest progress log
    Checkpoint(CheckpointArgs),
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// YAML configuration describing the destination and column mapping
    #[arg(short, long)]
    pub config: PathBuf,
    /// Input directory or single file
    #[arg(short, long, default_value = "data")]
    pub data: PathBuf,
    /// Directory holding per-file progress logs
    #[arg(short, long = "logs", default_value = "logs")]
    pub logs: PathBuf,
    /// Override the SQLite database path from the configuration
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Override the number of records per insert statement
    #[arg(long, value_parser = parse_batch_size)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CheckpointArgs {
    /// Input file name as it appears in progress log names (e.g. users.csv)
    pub file: String,
    /// Directory holding per-file progress logs
    #[arg(short, long = "logs", default_value = "logs")]
    pub logs: PathBuf,
}

pub fn parse_batch_size(value: &str) -> Result<usize, String> {
    let size = value
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("Invalid batch size '{value}': {err}"))?;
    if size == 0 {
        return Err("Batch size must be positive".to_string());
    }
    Ok(size)
}
