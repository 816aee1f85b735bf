//! timeweave CLI: align, inspect, and export entity timelines.
//!
//! Commands:
//! - `align`: align one or more entities and print or export the result
//! - `summary`: latest value per column over the default lookback window
//! - `datasets`: which sources hold data for an entity
//! - `config show`: print the effective configuration as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use timeweave_core::DatasetLoader;
use timeweave_runner::export::{self, ExportFormat};
use timeweave_runner::{AlignQuery, AppConfig, QueryService};

#[derive(Parser)]
#[command(
    name = "timeweave",
    about = "timeweave: timestamp alignment across heterogeneous entity datasets"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors.
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align entities over a date range.
    Align {
        /// Entity ids (e.g., AAPL MSFT). Defaults to the configured watchlist.
        entities: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to the lookback window before `--end`.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Alignment mode: dense (alias daily) or sparse. Defaults to the configured mode.
        #[arg(long)]
        mode: Option<String>,

        /// Comma-separated categories to keep (prices,financials,filings,news,organization).
        #[arg(long)]
        include: Option<String>,

        /// Output format: json, csv, or parquet.
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Output file, or directory when aligning several entities.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Latest value and as-of date per column.
    Summary {
        entity: String,
    },
    /// Point count and date span per source.
    Datasets {
        entity: String,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(path = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Align {
            entities,
            start,
            end,
            mode,
            include,
            format,
            output,
        } => {
            let entities = if entities.is_empty() {
                config.watchlist.0.clone()
            } else {
                entities
            };
            let svc = QueryService::from_config(&config);
            let queries: Vec<AlignQuery> = entities
                .iter()
                .map(|entity| {
                    let mut query = svc.query(entity.as_str());
                    query.start = start;
                    query.end = end;
                    if let Some(mode) = &mode {
                        query.mode = mode.clone();
                    }
                    query.include = include.clone();
                    query
                })
                .collect();
            run_align(&svc, &queries, format, output.as_deref())
        }
        Commands::Summary { entity } => {
            let svc = QueryService::from_config(&config);
            let summary = svc.summary(&entity)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Datasets { entity } => {
            let svc = QueryService::from_config(&config);
            run_datasets(&svc, &entity)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        },
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TIMEWEAVE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run_align<L: DatasetLoader>(
    svc: &QueryService<L>,
    queries: &[AlignQuery],
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    if output.is_none() && format == ExportFormat::Parquet {
        bail!("--format parquet requires --output");
    }

    let results = svc.align_many(queries);
    let mut failures = 0usize;
    let stdout = std::io::stdout();

    for (query, result) in queries.iter().zip(results) {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                eprintln!("Error for {}: {err}", query.entity);
                failures += 1;
                continue;
            }
        };

        if let Some(reason) = response.meta.empty_reason {
            eprintln!("{}: {}", response.entity, reason);
        }

        match output {
            Some(path) => {
                let target = if queries.len() > 1 {
                    path.join(format!("{}.{}", response.entity, format.extension()))
                } else {
                    path.to_path_buf()
                };
                export::write_file(&response, format, &target)
                    .with_context(|| format!("failed to export {}", response.entity))?;
                println!("{} → {} ({} rows)", response.entity, target.display(), response.row_count);
            }
            None => {
                let bytes = export::render(&response, format)?;
                let mut out = stdout.lock();
                out.write_all(&bytes)?;
                if !bytes.ends_with(b"\n") {
                    writeln!(out)?;
                }
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} alignments failed", queries.len());
    }
    Ok(())
}

fn run_datasets<L: DatasetLoader>(svc: &QueryService<L>, entity: &str) -> Result<()> {
    let response = svc.datasets(entity)?;
    let fmt_date = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());

    println!("{}", response.entity);
    println!("{:<14} {:>8}  {:<10}  {:<10}", "dataset", "points", "first", "last");
    for coverage in &response.datasets {
        println!(
            "{:<14} {:>8}  {:<10}  {:<10}",
            coverage.category.as_str(),
            coverage.points,
            fmt_date(coverage.first_date),
            fmt_date(coverage.last_date),
        );
    }
    match response.sparse_reference {
        Some(reference) => println!("sparse reference: {reference}"),
        None => println!("sparse reference: none (no data)"),
    }
    Ok(())
}
