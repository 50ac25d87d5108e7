use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use shard_combine::utils::{format_bytes, format_duration, setup_logging};
use shard_combine::{combine_to_db, discover_shards, merge_to_file, CombineConfig, SummaryFormat};

#[derive(Parser)]
#[command(name = "shard-combine")]
#[command(about = "Merge pre-sorted inventory shard files into one summarised stream")]
#[command(version)]
struct Args {
    #[arg(short, long, help = "Directory containing the walkers' shard files")]
    input: PathBuf,

    #[arg(short, long, help = "File name suffix shared by the shards to combine")]
    suffix: String,

    #[arg(short, long, help = "Record format: group, user-group, dir-group-user-type or dir-group-user-type-age")]
    format: SummaryFormat,

    #[arg(long, conflicts_with = "output", required_unless_present = "output", help = "Database directory to bulk load into")]
    db: Option<PathBuf>,

    #[arg(short, long, help = "Write the combined records to this file instead of a database")]
    output: Option<PathBuf>,

    #[arg(short, long, help = "Configuration file (JSON)")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) if path.exists() => CombineConfig::from_file(path)?,
        Some(path) => {
            let default_config = CombineConfig::default();
            default_config.to_file(path)?;
            default_config
        }
        None => CombineConfig::default(),
    };

    let verbosity = if args.verbose { "verbose" } else { config.verbosity.as_str() };
    setup_logging(verbosity)?;

    if !args.input.is_dir() {
        bail!("Input directory does not exist: {}", args.input.display());
    }

    let shards = discover_shards(&args.input, &args.suffix)?;
    let total_size: u64 = shards
        .iter()
        .filter_map(|f| std::fs::metadata(f).ok())
        .map(|m| m.len())
        .sum();

    info!(
        "Found {} {} shards ({})",
        shards.len(),
        args.format,
        format_bytes(total_size)
    );

    let format = args.format;
    let db = args.db.clone();
    let output = args.output.clone();

    // The combine blocks on file IO and its own bulk-load thread.
    let stats = tokio::task::spawn_blocking(move || match (db, output) {
        (Some(db), _) => combine_to_db(&shards, &db, format, config),
        (None, Some(output)) => merge_to_file(&shards, &output, format, config),
        (None, None) => unreachable!("clap requires --db or --output"),
    })
    .await??;

    info!("Combine completed successfully");
    info!("Shards merged: {}", stats.shards_merged);
    info!("Lines read: {}", stats.lines_read);
    info!("Records written: {}", stats.records_written);
    info!(
        "Processing time: {}",
        format_duration(Duration::from_millis(stats.elapsed_ms))
    );

    Ok(())
}
