mod aggregate;
mod alerts;
mod change;
mod error;
mod fallback;
mod fetch;
mod market;
mod model;
mod parser;
mod resilience;
mod server;
mod settings;
mod validate;
mod weather;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::market::MarketRun;
use crate::model::{MarketSnapshot, RawDocument};
use crate::parser::Extractor;
use crate::server::AppState;
use crate::settings::Settings;
use crate::validate::validate_all;

#[derive(Parser)]
#[command(name = "agro_feeds", about = "Kalimati market prices and farm weather advisories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch today's market prices and print the snapshot as JSON
    Market {
        /// Earlier snapshot (JSON) to compare against
        #[arg(short, long)]
        previous: Option<PathBuf>,
    },
    /// Fetch current weather and advisory as JSON
    Weather {
        /// City to look up (default from config)
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Run extraction and validation over a saved document, no network
    Extract {
        file: PathBuf,
    },
    /// Poll both feeds on a cadence and log alerts
    Watch {
        #[arg(short, long, default_value = "30")]
        interval_mins: u64,
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Serve the HTTP endpoints
    Serve {
        /// Listen address (default from config)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("loading configuration")?;

    let result = match cli.command {
        Commands::Market { previous } => {
            let previous = previous.as_deref().map(read_snapshot).transpose()?;
            let state = AppState::from_settings(&settings)?;
            let pb = spinner("Fetching market prices...")?;
            let run = state.market.run_detailed(previous.as_ref()).await;
            pb.finish_and_clear();
            print_run_summary(&run);
            println!("{}", serde_json::to_string_pretty(&run.snapshot)?);
            Ok(())
        }
        Commands::Weather { location } => {
            let state = AppState::from_settings(&settings)?;
            let pb = spinner("Fetching weather...")?;
            let snapshot = state.weather.run(location.as_deref()).await;
            pb.finish_and_clear();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Extract { file } => extract_file(&file, &settings),
        Commands::Watch {
            interval_mins,
            location,
        } => {
            let state = AppState::from_settings(&settings)?;
            let location = location.unwrap_or_else(|| settings.weather.default_location.clone());
            watch(&state, watch_period(interval_mins), &location).await;
            Ok(())
        }
        Commands::Serve { bind } => {
            let state = AppState::from_settings(&settings)?;
            let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
            server::serve(state, &bind).await
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn spinner(msg: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn read_snapshot(path: &Path) -> anyhow::Result<MarketSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_run_summary(run: &MarketRun) {
    let snap = &run.snapshot;
    eprintln!(
        "{} items from {} ({:?}), {} rows rejected",
        snap.item_count, snap.source, snap.provenance, run.rejected.len()
    );
    for m in run.significant_moves() {
        eprintln!("  {:<24} {:>8.0} -> {:<8.0} {:+.1}%", truncate(&m.crop, 24), m.previous, m.current, m.percent);
    }
}

fn extract_file(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let doc = RawDocument::new(path.display().to_string(), body);
    let extractor = Extractor::default();
    let candidates = extractor.extract(&doc);
    let report = validate_all(&candidates, &settings.validation_rules());

    println!(
        "Shape: {} | {} candidates, {} accepted, {} rejected\n",
        extractor.probe(&doc.body),
        candidates.len(),
        report.accepted.len(),
        report.rejected.len()
    );
    println!("{:<28} | {:<6} | {:>7} | {:>7} | {:>7} | {:<20}", "Crop", "Unit", "Min", "Max", "Avg", "Price");
    println!("{}", "-".repeat(90));
    for r in &report.accepted {
        let avg = r.avg.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<28} | {:<6} | {:>7} | {:>7} | {:>7} | {:<20}",
            truncate(&r.crop, 28), r.unit, r.min, r.max, avg, r.price
        );
    }

    if !report.rejected.is_empty() {
        println!("\n--- Rejected ---");
        for (name, reason) in &report.rejected {
            println!("  {}: {}", truncate(name, 28), reason);
        }
    }
    Ok(())
}

async fn watch(state: &AppState, every: Duration, location: &str) {
    info!("Watching every {} (Ctrl-C to stop)", format_duration(every));
    let mut ticker = tokio::time::interval(every);
    let mut previous: Option<MarketSnapshot> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                return;
            }
        }

        let (run, weather) = tokio::join!(
            state.market.run_detailed(previous.as_ref()),
            state.weather.run(Some(location)),
        );

        if let Some(alert) = alerts::market_alert(&run.snapshot, previous.as_ref()) {
            warn!("{}: {}", alert.title, alert.body);
        }
        if let Some(alert) = alerts::weather_alert(&weather, location) {
            warn!("{}: {}", alert.title, alert.body);
        }
        info!(
            "{} market items ({:?}); {} {}°C, {}",
            run.snapshot.item_count,
            run.snapshot.provenance,
            weather.location,
            weather.temperature,
            weather.advisory
        );

        // Estimates never become the comparison base.
        if !run.snapshot.is_fallback() {
            previous = Some(run.snapshot);
        }
    }
}

/// Poll period in minutes, at least one; absurd values saturate.
fn watch_period(mins: u64) -> Duration {
    Duration::from_secs(mins.max(1).saturating_mul(60))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
