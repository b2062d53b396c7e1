use anyhow::{Context, Result, bail};
use clap::Parser;
use horizoncast::application::feature_engineering_service::build_aligned_features;
use horizoncast::application::forecast_engine::{ForecastEngine, TrainingSummary};
use horizoncast::application::ml::labels::{construct_labels, write_dataset_csv};
use horizoncast::application::ml::trainer::BoosterParams;
use horizoncast::config::{Config, parse_symbols};
use horizoncast::domain::market::bar::Series;
use horizoncast::domain::market::timeframe::Timeframe;
use horizoncast::domain::ml::horizon::Horizon;
use horizoncast::domain::repositories::SeriesRepository;
use horizoncast::infrastructure::persistence::{
    CsvSeriesRepository, JsonModelRepository, PackageStore,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch trainer for the per-horizon forecast models", long_about = None)]
struct Args {
    /// Comma-separated symbols. Defaults to SYMBOLS, then to every symbol with a 1H cache.
    #[arg(long)]
    symbols: Option<String>,

    /// Worker threads (0 = one per core). Defaults to TRAIN_WORKERS.
    #[arg(long)]
    workers: Option<usize>,

    /// Boosting rounds per horizon
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Write the labeled training rows of each horizon as CSV into this directory
    #[arg(long)]
    dump_dataset: Option<PathBuf>,

    /// Export the on-device packages after training
    #[arg(long)]
    export: bool,
}

struct SymbolOutcome {
    symbol: String,
    result: Result<TrainingSummary, String>,
    elapsed_ms: u128,
}

fn dump_datasets(repository: &CsvSeriesRepository, symbol: &str, dir: &Path) -> Result<()> {
    let load = |tf: Timeframe| -> Result<Series> {
        Ok(repository
            .load(symbol, tf)?
            .unwrap_or_else(|| Series::empty(symbol, tf)))
    };
    let aligned = build_aligned_features(
        &load(Timeframe::OneHour)?,
        &load(Timeframe::FourHour)?,
        &load(Timeframe::OneDay)?,
    );
    for horizon in Horizon::ALL {
        let rows = construct_labels(&aligned, horizon.spec());
        let path = dir.join(format!("{}_{}_dataset.csv", symbol, horizon.key()));
        write_dataset_csv(&rows, &path)
            .with_context(|| format!("Failed to write dataset {:?}", path))?;
        info!("Wrote {} labeled rows to {:?}", rows.len(), path);
    }
    Ok(())
}

fn print_summary(outcomes: &[SymbolOutcome], total_ms: u128) {
    println!("\n══════════════════════════════════════════════════════");
    println!("  BATCH TRAINING SUMMARY");
    println!("══════════════════════════════════════════════════════");

    for outcome in outcomes {
        match &outcome.result {
            Ok(summary) => {
                let horizons: Vec<String> = summary
                    .horizons
                    .iter()
                    .map(|r| {
                        format!(
                            "{} n={} pos={:.0}% acc={:.0}%",
                            r.horizon.key(),
                            r.rows,
                            r.positive_rate * 100.0,
                            r.train_accuracy * 100.0
                        )
                    })
                    .collect();
                println!(
                    "  ✓ {:<10} {:>6}ms  {}",
                    outcome.symbol,
                    outcome.elapsed_ms,
                    horizons.join(" | ")
                );
            }
            Err(reason) => {
                println!("  ✗ {:<10} {:>6}ms  {}", outcome.symbol, outcome.elapsed_ms, reason);
            }
        }
    }

    let trained = outcomes.iter().filter(|o| o.result.is_ok()).count();
    println!("──────────────────────────────────────────────────────");
    println!(
        "  Trained {}/{} symbols in {:.1}s",
        trained,
        outcomes.len(),
        total_ms as f64 / 1000.0
    );
    println!("══════════════════════════════════════════════════════\n");
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let series = Arc::new(CsvSeriesRepository::new(config.data_dir()));
    let symbols = match &args.symbols {
        Some(raw) => parse_symbols(raw),
        None if !config.training.symbols.is_empty() => config.training.symbols.clone(),
        None => series.symbols(Timeframe::OneHour)?,
    };
    if symbols.is_empty() {
        bail!(
            "No symbols to train: pass --symbols, set SYMBOLS, or cache 1H data in {:?}",
            config.data_dir()
        );
    }

    if let Some(dir) = &args.dump_dataset {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create dataset directory {:?}", dir))?;
        for symbol in &symbols {
            if let Err(e) = dump_datasets(&series, symbol, dir) {
                error!("Dataset dump failed for {}: {:#}", symbol, e);
            }
        }
    }

    let engine = ForecastEngine::new(
        series.clone(),
        Arc::new(JsonModelRepository::new(config.model_dir())),
        PackageStore::new(config.model_dir()),
    )
    .with_params(BoosterParams {
        n_estimators: args.n_estimators,
        ..BoosterParams::default()
    });

    let workers = args.workers.unwrap_or(config.training.workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to build training thread pool")?;

    info!(
        "Training {} symbols on {} threads",
        symbols.len(),
        pool.current_num_threads()
    );

    let started = Instant::now();
    let outcomes: Vec<SymbolOutcome> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| {
                let t0 = Instant::now();
                let result = engine.train_symbol(symbol).map_err(|e| e.to_string());
                if let Err(reason) = &result {
                    error!("Training failed for {}: {}", symbol, reason);
                }
                SymbolOutcome {
                    symbol: symbol.clone(),
                    result,
                    elapsed_ms: t0.elapsed().as_millis(),
                }
            })
            .collect()
    });

    print_summary(&outcomes, started.elapsed().as_millis());

    if args.export {
        let bulk = engine.export_all_packages()?;
        println!(
            "Exported {} package(s) to {}",
            bulk.exported.len(),
            bulk.export_dir.display()
        );
    }

    if outcomes.iter().all(|o| o.result.is_err()) {
        bail!("No symbol could be trained");
    }
    Ok(())
}
