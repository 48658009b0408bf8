//! risk-loader CLI - full reload of the risk-monitoring store from CSV exports.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use risk_monitor_loader::{
    load_snapshot, orphan_count, store_fingerprint, table_counts, Config, Pipeline, PipelineError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "risk-loader")]
#[command(about = "Reload the risk-monitoring store from CSV exports in one transaction")]
#[command(version)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the destination database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the destination tables if they do not exist
    Init,

    /// Replace every table with the contents of the source directory
    Run {
        /// Override the source directory
        #[arg(long)]
        source: Option<PathBuf>,

        /// Print the load summary as JSON to stdout
        #[arg(long)]
        output_json: bool,
    },

    /// Read and type-check the source files without touching the store
    Check {
        /// Override the source directory
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Show row counts, orphan rows and the store fingerprint
    Verify,

    /// Print one customer's snapshot as JSON
    Show {
        /// Customer identifier, e.g. USR-001
        user_id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.verbosity, &cli.log_format) {
        eprintln!("❌ {}", e);
        return ExitCode::from(5);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(pipeline_err) => {
                eprintln!("❌ {}", pipeline_err.format_detailed());
                ExitCode::from(pipeline_err.exit_code())
            }
            None => {
                eprintln!("❌ Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env_overrides()?;

    if let Some(database) = cli.database {
        config.database.path = database;
    }

    match cli.command {
        Commands::Init => {
            let pipeline = Pipeline::new(config)?;
            pipeline.init()?;
            println!(
                "✓ Schema ready at {} ({} tables)",
                pipeline.config().database.path.display(),
                pipeline.catalog().len()
            );
        }

        Commands::Run {
            source,
            output_json,
        } => {
            if let Some(source) = source {
                config.source.directory = source;
            }
            let pipeline = Pipeline::new(config)?;
            let summary = pipeline.run_configured()?;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                for table in &summary.tables {
                    println!("✓ {:<22} {:>8} rows", table.table, table.rows);
                }
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                println!(
                    "✅ Reload committed: {} rows in {} ms (run {})",
                    summary.total_rows(),
                    summary.duration_ms,
                    summary.run_id
                );
            }
        }

        Commands::Check { source } => {
            if let Some(source) = source {
                config.source.directory = source;
            }
            let pipeline = Pipeline::new(config)?;
            let tables = pipeline.check(&pipeline.config().source.directory)?;
            for table in &tables {
                println!("✓ {:<22} {:>8} records", table.table, table.rows);
            }
            println!("✅ All {} source files are loadable", tables.len());
        }

        Commands::Verify => {
            let pipeline = Pipeline::new(config)?;
            let conn = pipeline.connect_read_only()?;

            for count in table_counts(&conn, pipeline.catalog())? {
                println!("✓ {:<22} {:>8} rows", count.table, count.rows);
            }
            let orphans = orphan_count(&conn, pipeline.catalog())?;
            println!("✓ Orphan rows: {}", orphans);
            println!("✓ Fingerprint: {}", store_fingerprint(&conn, pipeline.catalog())?);

            if orphans > 0 {
                bail!("{} rows reference a missing customer", orphans);
            }
        }

        Commands::Show { user_id } => {
            let pipeline = Pipeline::new(config)?;
            let conn = pipeline.connect_read_only()?;

            match load_snapshot(&conn, &user_id)? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => bail!("customer {} not found", user_id),
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so `--output-json` keeps stdout machine-readable.
fn setup_logging(verbosity: &str, format: &str) -> Result<()> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => bail!("unknown verbosity '{}'", other),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => bail!("unknown log format '{}'", other),
    }

    Ok(())
}
