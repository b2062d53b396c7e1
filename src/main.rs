use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use horizoncast::application::feature_engineering_service::latest_feature_map;
use horizoncast::application::forecast_engine::ForecastEngine;
use horizoncast::application::ml::model_inference::ModelInference;
use horizoncast::config::Config;
use horizoncast::domain::market::timeframe::Timeframe;
use horizoncast::domain::ml::signal::SignalFilter;
use horizoncast::domain::repositories::SeriesRepository;
use horizoncast::infrastructure::mock::SyntheticSeriesGenerator;
use horizoncast::infrastructure::persistence::{
    CsvSeriesRepository, JsonModelRepository, PackageStore,
};
use horizoncast::infrastructure::settings_persistence::SettingsPersistence;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Multi-horizon price movement forecaster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the 4H, 2D and 5D models for a symbol from its cached series
    Train {
        /// Symbol to train
        symbol: String,
    },
    /// Score the latest cached 1H bar with the trained models
    Infer {
        /// Symbol to score
        symbol: String,
    },
    /// Infer and classify the result with the persisted signal thresholds
    Signal {
        /// Symbol to classify
        symbol: String,
    },
    /// Assemble the on-device package for a symbol
    Export {
        /// Symbol to package
        symbol: String,
    },
    /// Package every trained symbol into the export directory
    ExportAll,
    /// Remove a symbol's models and package
    Delete {
        /// Symbol to remove
        symbol: String,
    },
    /// Write synthetic 1H/4H/1D caches for a symbol
    Generate {
        /// Symbol to generate
        symbol: String,

        /// Number of hourly bars
        #[arg(long, default_value_t = 1500)]
        bars: usize,

        /// RNG seed (defaults to SYNTHETIC_SEED)
        #[arg(long)]
        seed: Option<u64>,

        /// Price of the first bar
        #[arg(long, default_value_t = 100.0)]
        start_price: f64,
    },
    /// Score a symbol from an exported package, the way the device does
    Device {
        /// Symbol to score
        symbol: String,

        /// Directory holding the packages (defaults to MOBILE_MODELS_DIR)
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
    /// Show or update the persisted signal thresholds
    Thresholds {
        /// Threshold to change (COMBO_4H, COMBO_5D, SCALP_4H, WATCH_5D, AVOID) and its new percent value
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,
    },
}

fn build_engine(config: &Config) -> ForecastEngine {
    ForecastEngine::new(
        Arc::new(CsvSeriesRepository::new(config.data_dir())),
        Arc::new(JsonModelRepository::new(config.model_dir())),
        PackageStore::new(config.model_dir()),
    )
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Train { symbol } => {
            let symbol = symbol.to_uppercase();
            let summary = build_engine(&config).train_symbol(&symbol)?;

            println!("\n══════════════════════════════════════════════════════");
            println!("  TRAINING SUMMARY: {}", summary.symbol);
            println!("══════════════════════════════════════════════════════");
            println!(
                "  Rows: 1H={}  4H={}  1D={}",
                summary.rows_1h, summary.rows_4h, summary.rows_1d
            );
            for report in &summary.horizons {
                println!(
                    "  {:<3} rows={:<6} positive={:>5.1}%  train_acc={:>5.1}%  trees={}",
                    report.horizon.key(),
                    report.rows,
                    report.positive_rate * 100.0,
                    report.train_accuracy * 100.0,
                    report.trees
                );
            }
            println!("══════════════════════════════════════════════════════\n");
        }
        Commands::Infer { symbol } => {
            let symbol = symbol.to_uppercase();
            let result = build_engine(&config).run_inference(&symbol)?;

            println!("{} as of {}", result.symbol, result.as_of.to_rfc3339());
            for (horizon, pct) in result.as_percentages() {
                println!("  {:<3} {:>5.1}%", horizon.key(), pct);
            }
        }
        Commands::Signal { symbol } => {
            let symbol = symbol.to_uppercase();
            let result = build_engine(&config).run_inference(&symbol)?;
            let settings = SettingsPersistence::new(&config.storage.settings_path).load();
            let percentages = result.as_percentages();
            let signal = SignalFilter::evaluate(&percentages, &settings.thresholds);

            let parts: Vec<String> = percentages
                .iter()
                .map(|(h, p)| format!("{}={:.1}%", h.key(), p))
                .collect();
            println!(
                "{} {} (confidence {:.1}%, actionable: {})  [{}]",
                result.symbol,
                signal.kind,
                signal.confidence,
                signal.is_actionable,
                parts.join(" ")
            );
        }
        Commands::Export { symbol } => {
            let symbol = symbol.to_uppercase();
            let path = build_engine(&config).export_package(&symbol)?;
            println!("Exported {} to {}", symbol, path.display());
        }
        Commands::ExportAll => {
            let bulk = build_engine(&config).export_all_packages()?;
            println!(
                "Exported {} package(s) to {}",
                bulk.exported.len(),
                bulk.export_dir.display()
            );
            for symbol in &bulk.exported {
                println!("  ok    {}", symbol);
            }
            for (symbol, reason) in &bulk.failures {
                println!("  skip  {}: {}", symbol, reason);
            }
        }
        Commands::Delete { symbol } => {
            let symbol = symbol.to_uppercase();
            let removed = build_engine(&config).delete_package(&symbol)?;
            println!("Removed {} model file(s) for {}", removed, symbol);
        }
        Commands::Generate {
            symbol,
            bars,
            seed,
            start_price,
        } => {
            if bars == 0 {
                bail!("--bars must be greater than zero");
            }
            let symbol = symbol.to_uppercase();
            let seed = seed.unwrap_or(config.training.synthetic_seed);
            let repository = CsvSeriesRepository::new(config.data_dir());
            let generator = SyntheticSeriesGenerator::new(seed).with_start_price(start_price);

            for series in generator.series_set(&symbol, bars) {
                repository.save(&series)?;
                println!(
                    "Wrote {} {} bars to {}",
                    series.len(),
                    series.timeframe,
                    repository.path_for(&symbol, series.timeframe).display()
                );
            }
        }
        Commands::Device { symbol, models_dir } => {
            let symbol = symbol.to_uppercase();
            let series = CsvSeriesRepository::new(config.data_dir())
                .load(&symbol, Timeframe::OneHour)?
                .with_context(|| format!("No 1H data cached for {}", symbol))?;

            let mut inference =
                ModelInference::new(models_dir.unwrap_or(config.storage.mobile_models_dir))?;
            let loaded = inference.load_models(&symbol);
            info!(
                "Device: loaded {}/{} models for {} from {}",
                loaded.values().filter(|ok| **ok).count(),
                loaded.len(),
                symbol,
                inference.models_dir().display()
            );

            let features = latest_feature_map(&series);
            let predictions = inference.predict(&symbol, &features);
            let status = inference.model_status(&symbol);
            for (horizon, pct) in predictions {
                let state = status
                    .get(&horizon)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                println!("  {:<3} {:>5.1}%  ({})", horizon.key(), pct, state);
            }
        }
        Commands::Thresholds { set } => {
            let persistence = SettingsPersistence::new(&config.storage.settings_path);
            let settings = match set.as_deref() {
                Some([key, value]) => {
                    let value: f64 = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid threshold value '{}'", value))?;
                    persistence.update_threshold(key, value)?
                }
                Some(_) => bail!("--set expects KEY VALUE"),
                None => persistence.load(),
            };
            println!("{}", serde_json::to_string_pretty(&settings.thresholds)?);
        }
    }

    Ok(())
}
