use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use urlhaus_etl::config::Config;
use urlhaus_etl::error::EtlError;
use urlhaus_etl::logging;
use urlhaus_etl::metrics;
use urlhaus_etl::pipeline::Pipeline;
use urlhaus_etl::sink::{RecordSink, SqliteSink};
use urlhaus_etl::source;
use urlhaus_etl::types::CollectionStats;

#[derive(Parser)]
#[command(name = "urlhaus-etl")]
#[command(about = "Load malicious URL reports into a deduplicated document store")]
#[command(version)]
struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extract, transform and load once
    Run {
        /// Read records from this JSON file
        #[arg(long, conflicts_with = "source_url")]
        source_file: Option<PathBuf>,
        /// Fetch records from this URL instead of a file
        #[arg(long)]
        source_url: Option<String>,
    },
    /// Print the number of documents in the destination collection
    Count,
    /// Print collection statistics: totals by status, top threats, last ingest
    Stats,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _guard = logging::init_logging(&config.logging.dir);
    let metrics_handle = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    };

    let result = match cli.command {
        Commands::Run {
            source_file,
            source_url,
        } => {
            if let Some(file) = source_file {
                config.source.file = file;
                config.source.url = None;
            }
            if source_url.is_some() {
                config.source.url = source_url;
            }
            run(&config)
        }
        Commands::Count => count(&config),
        Commands::Stats => stats(&config),
    };

    if let Some(handle) = &metrics_handle {
        debug!("Metrics snapshot:\n{}", handle.render());
        if let Some(path) = &config.metrics.textfile {
            match metrics::write_snapshot(handle, path) {
                Ok(()) => info!("Metrics written to {}", path.display()),
                Err(e) => warn!("Failed to write metrics to {}: {}", path.display(), e),
            }
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ETL run failed: {}", e);
            println!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), EtlError> {
    let source = source::from_config(&config.source)?;
    let sink: Arc<dyn RecordSink> = Arc::new(SqliteSink::open(&config.store)?);

    let summary = Pipeline::new(source, sink.clone()).run()?;
    info!(run_id = %summary.run_id, "ETL run finished");

    println!("\nRun summary ({}):", summary.run_id);
    println!("   Read: {}", summary.read_count);
    println!("   Transformed: {}", summary.transformed_count);
    println!("   Rejected: {}", summary.rejected_count);
    println!("   Inserted: {}", summary.inserted_count);
    println!("   Skipped: {}", summary.skipped_count);
    println!("[+] ETL process completed successfully.");

    // Stats are informational; the load already succeeded
    match sink.stats() {
        Ok(stats) => print_stats(config, &stats),
        Err(e) => warn!("Could not compute collection stats: {}", e),
    }
    Ok(())
}

fn count(config: &Config) -> Result<(), EtlError> {
    let sink = SqliteSink::open(&config.store)?;
    println!(
        "{}.{}: {} documents",
        config.store.database,
        config.store.collection,
        sink.count()?
    );
    Ok(())
}

fn stats(config: &Config) -> Result<(), EtlError> {
    let sink = SqliteSink::open(&config.store)?;
    print_stats(config, &sink.stats()?);
    Ok(())
}

fn print_stats(config: &Config, stats: &CollectionStats) {
    println!(
        "\nCollection {}.{}:",
        config.store.database, config.store.collection
    );
    println!("   Total documents: {}", stats.total);
    for (status, n) in &stats.by_status {
        println!("   Status {}: {}", status, n);
    }
    if !stats.top_threats.is_empty() {
        println!("   Top threats:");
        for (threat, n) in &stats.top_threats {
            println!("      {}: {}", threat, n);
        }
    }
    match stats.latest_ingested_at {
        Some(at) => println!("   Last ingested: {}", at.to_rfc3339()),
        None => println!("   Last ingested: never"),
    }
    info!(total = stats.total, "Collection stats computed");
}
