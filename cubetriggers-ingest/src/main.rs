//! cubetriggers-ingest - CubeTriggers import worker
//!
//! Imports algorithm text files into the trigger database, runs the
//! background processing queues to completion, and answers trigger
//! statistics queries from the command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cubetriggers_common::config::Config;
use cubetriggers_common::events::EventBus;
use cubetriggers_common::{AlgType, ImportStatus};
use cubetriggers_ingest::db::aggregates::{self, TriggerFilters};
use cubetriggers_ingest::db::{import_runs, sources};
use cubetriggers_ingest::jobs::JobQueue;
use cubetriggers_ingest::{start_import, StartImportRequest};

#[derive(Parser)]
#[command(name = "cubetriggers-ingest", version, about = "CubeTriggers import worker")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import an algorithm text file for a named source
    Import {
        /// Source name (created or updated by name)
        #[arg(long)]
        source: String,
        /// Source URL
        #[arg(long)]
        url: Option<String>,
        /// Source description
        #[arg(long)]
        description: Option<String>,
        /// Text file with one algorithm per line
        file: PathBuf,
    },
    /// Show the most common triggers
    Triggers {
        /// Filter by trigger length in moves
        #[arg(long)]
        length: Option<usize>,
        /// Filter by algorithm category (F2L, OLL, PLL, ...)
        #[arg(long)]
        alg_type: Option<String>,
        /// Filter by source name
        #[arg(long)]
        source: Option<String>,
        /// Minimum total occurrences
        #[arg(long)]
        min_occurrences: Option<usize>,
        /// Maximum number of rows
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show recent import runs for a source
    Status {
        #[arg(long)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = config.database_path();
    info!("Database: {}", db_path.display());

    let pool = cubetriggers_common::db::init_database_pool(&db_path).await?;

    match cli.command {
        Command::Import {
            source,
            url,
            description,
            file,
        } => run_import(pool, config, source, url, description, file).await,
        Command::Triggers {
            length,
            alg_type,
            source,
            min_occurrences,
            limit,
        } => show_triggers(pool, length, alg_type, source, min_occurrences, limit).await,
        Command::Status { source } => show_status(pool, source).await,
    }
}

async fn run_import(
    pool: sqlx::SqlitePool,
    config: Config,
    source: String,
    url: Option<String>,
    description: Option<String>,
    file: PathBuf,
) -> Result<()> {
    let algorithms_text = std::fs::read_to_string(&file)
        .with_context(|| format!("Could not read {}", file.display()))?;

    let event_bus = EventBus::new(config.event_bus_capacity);

    // Log every event the pipeline broadcasts while the queues drain
    let mut rx = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            info!(event = %serde_json::to_string(&event).unwrap_or_default(), "{}", event.event_type());
        }
    });

    let queue = JobQueue::start(pool.clone(), event_bus, config);

    let run = start_import(
        &pool,
        &queue,
        StartImportRequest {
            source_name: source,
            source_url: url,
            description,
            algorithms_text,
        },
    )
    .await?;

    // Closing the queues drains the import job and the delayed aggregate job
    queue.shutdown().await;
    printer.abort();

    let run = import_runs::require_run(&pool, run.id).await?;
    match run.status {
        ImportStatus::Completed => {
            info!(
                import_run_id = %run.id,
                total = run.total_algorithms,
                processed = run.processed_algorithms,
                "Import finished"
            );
            Ok(())
        }
        status => {
            bail!(
                "Import run {} ended in {} ({})",
                run.id,
                status,
                run.error_message.unwrap_or_else(|| "no error message".to_string())
            );
        }
    }
}

async fn show_triggers(
    pool: sqlx::SqlitePool,
    length: Option<usize>,
    alg_type: Option<String>,
    source: Option<String>,
    min_occurrences: Option<usize>,
    limit: usize,
) -> Result<()> {
    let alg_type = alg_type
        .as_deref()
        .map(|s| AlgType::from_str(&s.to_uppercase()))
        .transpose()?;

    let source_id = match source {
        Some(name) => Some(
            sources::get_source_by_name(&pool, &name)
                .await?
                .with_context(|| format!("Unknown source '{}'", name))?
                .id,
        ),
        None => None,
    };

    let filters = TriggerFilters {
        length,
        alg_type,
        source_id,
        min_occurrences,
    };

    let triggers = aggregates::top_triggers(&pool, &filters, limit).await?;

    if triggers.is_empty() {
        println!("No triggers match the given filters.");
        return Ok(());
    }

    println!("{:<30} {:>6} {:>12} {:>10} {:>8}", "TRIGGER", "LENGTH", "OCCURRENCES", "ALGORITHMS", "SOURCES");
    for stat in triggers {
        println!(
            "{:<30} {:>6} {:>12} {:>10} {:>8}",
            stat.moves,
            stat.length,
            stat.aggregate.total_occurrences,
            stat.aggregate.algorithm_coverage,
            stat.aggregate.source_coverage,
        );
    }

    Ok(())
}

async fn show_status(pool: sqlx::SqlitePool, source: String) -> Result<()> {
    let source = sources::get_source_by_name(&pool, &source)
        .await?
        .with_context(|| format!("Unknown source '{}'", source))?;

    let runs = import_runs::recent_runs_for_source(&pool, source.id, 10).await?;

    if runs.is_empty() {
        println!("No import runs for source '{}'.", source.name);
        return Ok(());
    }

    println!("{:<38} {:<12} {:>7} {:>9}  {}", "RUN", "STATUS", "TOTAL", "PROCESSED", "STARTED");
    for run in runs {
        println!(
            "{:<38} {:<12} {:>7} {:>9}  {}",
            run.id,
            run.status,
            run.total_algorithms,
            run.processed_algorithms,
            run.started_at.to_rfc3339(),
        );
    }

    Ok(())
}
