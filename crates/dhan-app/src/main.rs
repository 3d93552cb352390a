//! Dhan order bridge - Entry Point
//!
//! Operator CLI: refresh the instrument master, place one order, run a
//! bulk CSV, and manage the deferred trigger queue.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dhan_app::{AppConfig, Application};
use dhan_core::{Price, RawOrder};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;

/// Dhan order bridge
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DHAN_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the instrument master and rebuild the catalog
    Refresh,
    /// Place one bracket or trigger order
    Place {
        /// Order as JSON
        #[arg(long, conflicts_with = "file")]
        json: Option<String>,
        /// File holding the order JSON
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Place every row of a CSV file
    Bulk {
        /// CSV with a header row
        path: PathBuf,
    },
    /// Deferred trigger queue
    Deferred {
        #[command(subcommand)]
        action: DeferredAction,
    },
}

#[derive(Subcommand, Debug)]
enum DeferredAction {
    /// Run the poller until Ctrl-C
    Run,
    /// Park an order until its price band is hit
    Add {
        /// File holding the order JSON
        #[arg(long)]
        file: PathBuf,
        /// Band centre
        #[arg(long)]
        trigger: Decimal,
        /// Band half-width in percent
        #[arg(long, default_value = "0.5")]
        tolerance: Decimal,
    },
    /// List stored records, newest first
    List,
    /// Remove every stored record
    Clear,
}

fn read_order(json: Option<String>, file: Option<PathBuf>) -> Result<RawOrder> {
    let text = match (json, file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("pass the order with --json or --file"),
    };
    serde_json::from_str(&text).context("order is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    dhan_telemetry::init_logging()?;

    info!("Starting Dhan bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    info!(
        api_base_url = %config.api_base_url,
        catalog_mode = ?config.catalog.mode,
        "Configuration loaded"
    );

    let app = Application::new(config);

    match args.command {
        Command::Refresh => {
            let stats = app.refresh_instruments().await?;
            println!(
                "Loaded {} instruments ({} skipped, {} duplicate ids)",
                stats.rows_indexed, stats.rows_skipped, stats.duplicate_ids
            );
        }
        Command::Place { json, file } => {
            let raw = read_order(json, file)?;
            let placed = app.place(&raw).await?;
            println!("{}", serde_json::to_string_pretty(&placed)?);
        }
        Command::Bulk { path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let rows = dhan_bulk::rows_from_csv(file)?;
            let job = app.run_bulk(rows).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Deferred { action } => match action {
            DeferredAction::Run => app.run_deferred().await?,
            DeferredAction::Add {
                file,
                trigger,
                tolerance,
            } => {
                let raw = read_order(None, Some(file))?;
                let queue = app.deferred_queue()?;
                let id = app
                    .enqueue_deferred(&queue, raw, Price::new(trigger), tolerance)
                    .await?;
                println!("{id}");
            }
            DeferredAction::List => {
                let queue = app.deferred_queue()?;
                for record in queue.store().list_all() {
                    let last = record
                        .last_price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  {:<8} {:<20} trigger={} tol={}% last={} order={}",
                        record.id,
                        record.status.to_string(),
                        record.symbol,
                        record.trigger_price,
                        record.tolerance_pct,
                        last,
                        record.order_id.as_deref().unwrap_or("-"),
                    );
                }
            }
            DeferredAction::Clear => {
                let queue = app.deferred_queue()?;
                let removed = queue.store().clear()?;
                println!("Removed {removed} records");
            }
        },
    }

    Ok(())
}
