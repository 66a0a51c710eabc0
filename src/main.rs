mod config;
mod error;
mod filter;
mod loader;
mod models;
mod overlay;
mod pipeline;
mod scheduler;
mod source;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::filter::filter_listings;
use crate::loader::{load_forecast_csv, load_realized_csv};
use crate::models::OverlaySeries;
use crate::pipeline::{QuoteBoard, assemble_overlay, follow};
use crate::source::sample::SampleSource;
use crate::source::{HttpForecastSource, HttpQuoteSource, QuoteSource};

#[derive(Parser)]
#[command(name = "market-pulse", about = "Market quote refresh and forecast overlay", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use built-in sample quotes instead of the quote endpoint
    #[arg(long, global = true, env = "PULSE_OFFLINE")]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Poll quotes on an interval and log every refresh
    Watch {
        /// Comma-separated symbols (default: configured indices)
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Stop after this many successful refreshes per symbol
        #[arg(short, long)]
        updates: Option<usize>,
    },

    /// Merge realized history with a forecast and print the overlay
    Forecast {
        /// Stock symbol, e.g. INFY
        symbol: String,

        /// Realized history CSV (investing.com export)
        #[arg(long)]
        history: Option<PathBuf>,

        /// Read the forecast from CSV instead of the prediction service
        #[arg(long)]
        forecast_csv: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Search the stock list by symbol or name
    Search {
        /// Case-insensitive substring; empty lists everything
        #[arg(default_value = "")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "market_pulse=info,warn",
        1 => "market_pulse=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    config.offline |= cli.offline;

    match cli.command {
        Command::Watch { symbols, interval_ms, updates } => {
            if let Some(ms) = interval_ms {
                config.scheduler.interval_ms = ms;
            }
            let symbols = if symbols.is_empty() { config.quotes.symbols.clone() } else { symbols };
            watch(&config, &symbols, updates).await?;
        }

        Command::Forecast { symbol, history, forecast_csv, json } => {
            let _t = utils::Timer::start(format!("Forecast overlay for {}", symbol));
            let realized = match &history {
                Some(path) => load_realized_csv(path)?,
                None => {
                    warn!("No --history given; overlay will be forecast-only");
                    Vec::new()
                }
            };

            let series = match &forecast_csv {
                Some(path) => overlay::build(&realized, &load_forecast_csv(path)?)?,
                None => {
                    let source = HttpForecastSource::new(&config.forecast)?;
                    assemble_overlay(&symbol, &realized, &source).await?
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print_overlay(&symbol, &series);
            }
        }

        Command::Search { query } => {
            let listings = SampleSource::new().listings();
            let found = filter_listings(&listings, &query);
            if found.is_empty() {
                println!("No stocks match {:?}.", query);
            }
            for l in found {
                println!(
                    "  {:<10} {:<28} {:<4} {:>10.2} {:>+8.2} ({:+.2}%)  vol {}",
                    l.symbol,
                    l.name,
                    l.exchange.as_deref().unwrap_or("—"),
                    l.price,
                    l.change,
                    l.change_percent,
                    l.volume.map(utils::fmt_number).unwrap_or_else(|| "—".into()),
                );
            }
        }
    }

    Ok(())
}

async fn watch(config: &AppConfig, symbols: &[String], updates: Option<usize>) -> Result<()> {
    let source: Arc<dyn QuoteSource> = if config.offline {
        info!("Offline mode: serving sample quotes");
        Arc::new(SampleSource::new())
    } else {
        Arc::new(HttpQuoteSource::new(&config.quotes)?)
    };

    let board = QuoteBoard::start(source, symbols, config.scheduler.policy())
        .context("Failed to start quote polling")?;

    let mut followers = JoinSet::new();
    for h in board.handles() {
        followers.spawn(follow(h.name().to_string(), h.subscribe(), updates));
    }

    let mut trails = Vec::new();
    loop {
        tokio::select! {
            joined = followers.join_next() => match joined {
                Some(Ok(trail)) => trails.push(trail),
                Some(Err(e)) => warn!("Follower task failed: {}", e),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    board.stop_all();
    // Followers exit once they observe `Stopped`.
    while let Ok(Some(joined)) =
        tokio::time::timeout(Duration::from_secs(1), followers.join_next()).await
    {
        if let Ok(trail) = joined {
            trails.push(trail);
        }
    }

    println!("─────────────────────────────────");
    for (name, state) in board.snapshots() {
        let price = utils::fmt_price(state.latest.as_ref().map(|q| q.price));
        let stale = state
            .last_error_kind()
            .map(|kind| format!(" (stale, last refresh: {:?} error)", kind))
            .unwrap_or_default();
        println!("  {:<12}: {}{}", name, price, stale);
    }
    println!("  Realized points collected: {}", trails.iter().map(|t| t.points().len()).sum::<usize>());
    println!("─────────────────────────────────");
    Ok(())
}

fn print_overlay(symbol: &str, series: &OverlaySeries) {
    use crate::utils::fmt_price as cell;

    println!("─────────────────────────────────────────────────────────");
    println!("  {} — actual vs. forecast", symbol);
    println!("─────────────────────────────────────────────────────────");
    println!("  {:<10} {:>10} {:>10} {:>10} {:>10}", "Date", "Actual", "Forecast", "Lower", "Upper");
    for (i, row) in series.rows.iter().enumerate() {
        println!(
            "  {:<10} {:>10} {:>10} {:>10} {:>10}",
            row.date.to_string(),
            cell(row.actual),
            cell(row.predicted),
            cell(row.lower),
            cell(row.upper),
        );
        if series.boundary_index == Some(i) && i + 1 < series.len() {
            println!("  ┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄ forecast ┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄");
        }
    }
    if series.is_empty() {
        println!("  (no data)");
    } else {
        println!("  {} projected rows beyond the last close", series.projected().len());
    }
    println!("─────────────────────────────────────────────────────────");
}
