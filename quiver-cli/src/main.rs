use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quiver_cli::config::CliConfig;
use quiver_cli::filters::parse_filters;
use quiver_cli::import::{ImportOptions, import};
use quiver_core::{Event, EventStore, StoreConfig};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "quiver")]
#[command(about = "Import and query a local Nostr event store", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "./quiver.db")]
    db: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Show detailed logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import Nostr events from JSONL into the store
    Import {
        /// Input file path (.jsonl, .jsonl.gz) or '-' for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Events per transaction
        #[arg(short, long, default_value = "500")]
        batch_size: usize,

        /// Verify event ids and signatures
        #[arg(long)]
        verify: bool,

        /// Drop lines whose kind does not fit in a u16 before parsing
        #[arg(long)]
        filter_invalid_kinds: bool,

        /// Disable progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Print matching events as JSONL, newest first
    Query {
        /// Filter object or array of filter objects
        #[arg(value_name = "FILTER_JSON")]
        filter: String,
    },

    /// Print the number of matching events
    Count {
        #[arg(value_name = "FILTER_JSON")]
        filter: String,
    },

    /// Delete matching events and print how many were removed
    Delete {
        #[arg(value_name = "FILTER_JSON")]
        filter: String,
    },

    /// Remove expired events
    Sweep,

    /// Print store statistics
    Stats,

    /// Print the SQL and query plan for a filter
    Explain {
        #[arg(value_name = "FILTER_JSON")]
        filter: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?.into_store_config(),
        None => StoreConfig::default(),
    };
    let mut store = open_store(&cli.db, config)?;

    match cli.command {
        Commands::Import {
            input,
            batch_size,
            verify,
            filter_invalid_kinds,
            no_progress,
        } => {
            info!("Input: {}", input);
            info!("Database: {}", cli.db.display());
            info!("Verification: {}", if verify { "enabled" } else { "disabled" });
            info!("Batch size: {}", batch_size);

            let options = ImportOptions {
                batch_size,
                verify,
                filter_invalid_kinds,
                show_progress: !no_progress,
            };
            let stats = import(&mut store, &input, &options)?;
            stats.print_summary();

            // Exit code: 1 if no line could be parsed at all
            if stats.parsed() == 0 && stats.invalid > 0 {
                std::process::exit(1);
            }
        }
        Commands::Query { filter } => {
            let filters = parse_filters(&filter)?;
            print_events(&store, &filters)?;
        }
        Commands::Count { filter } => {
            let filters = parse_filters(&filter)?;
            println!("{}", store.count_many(&filters)?);
        }
        Commands::Delete { filter } => {
            let filters = parse_filters(&filter)?;
            let deleted = store.delete_many(&filters)?;
            info!("Deleted {} events", deleted);
            println!("{}", deleted);
        }
        Commands::Sweep => {
            println!("{}", store.sweep_expired()?);
        }
        Commands::Stats => print_stats(&store, &cli.db)?,
        Commands::Explain { filter } => {
            let filters = parse_filters(&filter)?;
            print!("{}", store.explain_many(&filters)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::filter::LevelFilter;

    let filter = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db: &Path, config: StoreConfig) -> Result<EventStore> {
    if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let store = EventStore::open(db, config)
        .with_context(|| format!("Failed to open database: {}", db.display()))?;
    debug!(seed = store.seed(), fts = %store.fts_version(), "Opened store");
    Ok(store)
}

fn print_events(store: &EventStore, filters: &[quiver_core::Filter]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failure = None;

    store.query_many_each(filters, |event| {
        if failure.is_none()
            && let Err(e) = write_event(&mut out, &event)
        {
            failure = Some(e);
        }
    })?;

    if let Some(e) = failure {
        return Err(e);
    }
    out.flush()?;
    Ok(())
}

fn write_event(out: &mut impl Write, event: &Event) -> Result<()> {
    let json = String::try_from(event)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

fn print_stats(store: &EventStore, db: &Path) -> Result<()> {
    let stats = store.stats()?;

    println!("📊 Store Statistics:");
    println!("  Database:          {}", db.display());
    println!("  Total events:      {}", stats.total_events);
    println!("  Tag rows:          {}", stats.tag_rows);
    println!("  Unique authors:    {}", stats.unique_authors);
    println!("  Expiring events:   {}", stats.expiring_events);
    println!("  Vanished authors:  {}", stats.vanished_authors);
    println!("  Earliest event:    {}", format_timestamp(stats.earliest_event));
    println!("  Latest event:      {}", format_timestamp(stats.latest_event));
    println!("  Full-text search:  {}", stats.fts_version);
    println!("  Tag hash seed:     {:#018x}", store.seed());
    Ok(())
}

fn format_timestamp(timestamp: Option<i64>) -> String {
    match timestamp {
        None => "-".to_string(),
        Some(ts) => chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| ts.to_string()),
    }
}
