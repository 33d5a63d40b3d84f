use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mediathek::config::{self, HarvestConfig};
use mediathek::fetch::HttpSession;
use mediathek::stats::HarvestStats;
use mediathek::store::Store;
use mediathek::{decode, export, pipeline};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "mediathek")]
#[command(about = "Harvest the MDR Mediathek into a prefix-compressed CSV")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the catalog and export it as compressed CSV
    Harvest(HarvestArgs),
    /// Restore a compressed export into a plain CSV
    Expand(ExpandArgs),
}

#[derive(Args)]
struct HarvestArgs {
    /// Output directory for the export
    #[arg(short, long)]
    output: String,

    /// File name inside the output directory (default: mediathek-<timestamp>.csv)
    #[arg(long)]
    file: Option<String>,

    /// Site root the seed pages are resolved against
    #[arg(long, default_value = config::BASE_URL)]
    base_url: String,

    /// Workers fetching the seed pages
    #[arg(long, default_value_t = config::DEFAULT_SEED_WORKERS)]
    seed_workers: usize,

    /// Workers expanding index pages into shows
    #[arg(long, default_value_t = config::DEFAULT_SHOW_WORKERS)]
    show_workers: usize,

    /// Workers expanding shows into broadcasts
    #[arg(long, default_value_t = config::DEFAULT_BROADCAST_WORKERS)]
    broadcast_workers: usize,

    /// Workers resolving broadcasts into streams
    #[arg(long, default_value_t = config::DEFAULT_STREAM_WORKERS)]
    stream_workers: usize,

    /// Limit number of index pages to expand (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Dry run - harvest and store, but don't write the export
    #[arg(long)]
    dry_run: bool,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct ExpandArgs {
    /// Compressed export to read
    #[arg(short, long)]
    input: PathBuf,

    /// Plain CSV to write
    #[arg(short, long)]
    output: PathBuf,
}

fn run_harvest(args: HarvestArgs) -> Result<()> {
    let config = HarvestConfig {
        base_url: args.base_url,
        seed_workers: args.seed_workers,
        show_workers: args.show_workers,
        broadcast_workers: args.broadcast_workers,
        stream_workers: args.stream_workers,
        index_limit: args.limit,
        progress: !args.quiet,
    };

    let export_path = if args.dry_run {
        None
    } else {
        fs::create_dir_all(&args.output)
            .with_context(|| format!("Failed to create output directory: {}", args.output))?;
        let name = args.file.unwrap_or_else(|| {
            format!(
                "mediathek-{}.csv",
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            )
        });
        Some(Path::new(&args.output).join(name))
    };

    let stats = HarvestStats::new();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("mediathek-worker")
        .enable_io()
        .enable_time()
        .build()?;

    info!("Starting harvest");
    let start_harvest = Instant::now();
    let records = rt.block_on(pipeline::harvest(&config, HttpSession::new, &stats))?;
    let harvest_duration = start_harvest.elapsed();
    info!(
        duration_secs = harvest_duration.as_secs_f64(),
        streams = records.len(),
        "Harvest complete"
    );

    let mut store = Store::open_in_memory().context("Failed to open record store")?;
    let inserted = store
        .insert_many(&records)
        .context("Failed to store stream records")?;
    stats.add_inserted(inserted as u64, (records.len() - inserted) as u64);
    drop(records);

    let start_export = Instant::now();
    let rows = match &export_path {
        Some(path) => export::export_to_path(&store, path)?,
        None => 0,
    };
    let export_duration = start_export.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Harvest time:       {:.2}s", harvest_duration.as_secs_f64());
    println!("Export time:        {:.2}s", export_duration.as_secs_f64());
    println!();
    println!("Index pages:        {}", stats.index_urls());
    println!("Shows:              {}", stats.shows());
    println!("Broadcasts:         {}", stats.broadcasts());
    println!("Streams:            {}", stats.streams());
    println!("Failed pages:       {}", stats.failures());
    println!("Stored records:     {}", stats.records_inserted());
    println!("Duplicates skipped: {}", stats.duplicates_ignored());
    match &export_path {
        Some(path) => println!("Exported rows:      {} ({})", rows, path.display()),
        None => println!("Exported rows:      dry run, nothing written"),
    }

    Ok(())
}

fn run_expand(args: ExpandArgs) -> Result<()> {
    let rows = decode::expand_file(&args.input, &args.output)?;
    println!("Expanded {} rows into {}", rows, args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Harvest(args) => run_harvest(args),
        Commands::Expand(args) => run_expand(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
