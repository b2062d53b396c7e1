//! Desktop orchestration: training, inference and package export for one
//! symbol at a time.
//!
//! Every operation reads its inputs from the repositories, computes a fresh
//! result and writes whole files back, so calls for different symbols are
//! independent. Re-training or re-exporting a symbol replaces its files
//! (last writer wins).

use crate::application::feature_engineering_service::{AlignedRow, build_aligned_features};
use crate::application::ml::labels::{construct_labels, to_matrix};
use crate::application::ml::trainer::{BoosterParams, fit};
use crate::application::ml::tree_ensemble::{TreeEnsemble, to_percent};
use crate::domain::errors::{
    DataUnavailableError, ExportError, InferenceError, NoValidModelsError, TrainingError,
};
use crate::domain::market::bar::Series;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::feature_registry::FeatureVector;
use crate::domain::ml::horizon::Horizon;
use crate::domain::ml::manifest::PackageManifest;
use crate::domain::repositories::{ModelRepository, SeriesRepository};
use crate::infrastructure::persistence::PackageStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Minimum labeled rows every horizon needs before fitting
pub const MIN_TRAINING_ROWS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct HorizonReport {
    pub horizon: Horizon,
    pub rows: usize,
    pub positive_rate: f64,
    pub train_accuracy: f64,
    pub trees: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub symbol: String,
    pub rows_1h: usize,
    pub rows_4h: usize,
    pub rows_1d: usize,
    pub horizons: Vec<HorizonReport>,
}

/// Probabilities for one symbol at the latest aligned 1H bar
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    /// Horizon to probability in [0, 1]. Horizons without a usable model hold 0.
    pub probabilities: BTreeMap<Horizon, f64>,
    pub features: FeatureVector,
}

impl ForecastResult {
    /// Probabilities as percentages rounded to one decimal
    pub fn as_percentages(&self) -> BTreeMap<Horizon, f64> {
        self.probabilities
            .iter()
            .map(|(h, p)| (*h, to_percent(*p)))
            .collect()
    }
}

/// Outcome of a bulk export that packaged at least one symbol
#[derive(Debug, Clone)]
pub struct BulkExport {
    pub export_dir: PathBuf,
    pub exported: Vec<String>,
    /// Symbols that were skipped, with the reason
    pub failures: Vec<(String, String)>,
}

pub struct ForecastEngine {
    series: Arc<dyn SeriesRepository>,
    models: Arc<dyn ModelRepository>,
    packages: PackageStore,
    params: BoosterParams,
}

impl ForecastEngine {
    pub fn new(
        series: Arc<dyn SeriesRepository>,
        models: Arc<dyn ModelRepository>,
        packages: PackageStore,
    ) -> Self {
        Self {
            series,
            models,
            packages,
            params: BoosterParams::default(),
        }
    }

    pub fn with_params(mut self, params: BoosterParams) -> Self {
        self.params = params;
        self
    }

    pub fn packages(&self) -> &PackageStore {
        &self.packages
    }

    /// Fits and stores one ensemble per horizon.
    ///
    /// Nothing is written unless every horizon has at least
    /// `MIN_TRAINING_ROWS` labeled rows. Empty 4H or 1D series are allowed;
    /// their columns become zeros.
    pub fn train(
        &self,
        symbol: &str,
        series_1h: &Series,
        series_4h: &Series,
        series_1d: &Series,
    ) -> Result<TrainingSummary, TrainingError> {
        if series_1h.is_empty() {
            return Err(DataUnavailableError {
                symbol: symbol.to_string(),
                timeframe: Timeframe::OneHour,
            }
            .into());
        }

        info!(
            "ForecastEngine: Training {} (1H:{}, 4H:{}, 1D:{})",
            symbol,
            series_1h.len(),
            series_4h.len(),
            series_1d.len()
        );

        let aligned = build_aligned_features(series_1h, series_4h, series_1d);
        let labeled: Vec<_> = Horizon::ALL
            .iter()
            .map(|h| (*h, construct_labels(&aligned, h.spec())))
            .collect();

        let fewest = labeled.iter().map(|(_, rows)| rows.len()).min().unwrap_or(0);
        if fewest < MIN_TRAINING_ROWS {
            return Err(TrainingError::InsufficientData {
                symbol: symbol.to_string(),
                rows: fewest,
                required: MIN_TRAINING_ROWS,
                rows_1h: series_1h.len(),
                rows_4h: series_4h.len(),
                rows_1d: series_1d.len(),
            });
        }

        let mut reports = Vec::with_capacity(labeled.len());
        for (horizon, rows) in labeled {
            let (x, y) = to_matrix(&rows);
            let ensemble = fit(&x, &y, &self.params);

            let json = ensemble.to_json().map_err(|e| TrainingError::Persistence {
                symbol: symbol.to_string(),
                horizon,
                reason: e.to_string(),
            })?;
            self.models
                .save(symbol, horizon, &json)
                .map_err(|e| TrainingError::Persistence {
                    symbol: symbol.to_string(),
                    horizon,
                    reason: format!("{:#}", e),
                })?;

            info!(
                "ForecastEngine: {} {} trained on {} rows (positive {:.1}%, accuracy {:.1}%)",
                symbol,
                horizon,
                rows.len(),
                ensemble.positive_rate * 100.0,
                ensemble.train_accuracy * 100.0
            );
            reports.push(HorizonReport {
                horizon,
                rows: rows.len(),
                positive_rate: ensemble.positive_rate,
                train_accuracy: ensemble.train_accuracy,
                trees: ensemble.trees.len(),
            });
        }

        Ok(TrainingSummary {
            symbol: symbol.to_string(),
            rows_1h: series_1h.len(),
            rows_4h: series_4h.len(),
            rows_1d: series_1d.len(),
            horizons: reports,
        })
    }

    /// Trains from the cached series
    pub fn train_symbol(&self, symbol: &str) -> Result<TrainingSummary, TrainingError> {
        let [s1h, s4h, s1d] = self
            .load_series_set(symbol)
            .map_err(|e| TrainingError::Storage(format!("{:#}", e)))?;
        let s1h = s1h
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DataUnavailableError {
                symbol: symbol.to_string(),
                timeframe: Timeframe::OneHour,
            })?;
        let s4h = s4h.unwrap_or_else(|| Series::empty(symbol, Timeframe::FourHour));
        let s1d = s1d.unwrap_or_else(|| Series::empty(symbol, Timeframe::OneDay));
        self.train(symbol, &s1h, &s4h, &s1d)
    }

    /// Scores the latest aligned row of the cached series with each stored
    /// ensemble. A horizon whose model is missing or unreadable reports 0.
    pub fn run_inference(&self, symbol: &str) -> Result<ForecastResult, InferenceError> {
        let [s1h, s4h, s1d] = self
            .load_series_set(symbol)
            .map_err(|e| InferenceError::Storage(format!("{:#}", e)))?;
        let s1h = s1h
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DataUnavailableError {
                symbol: symbol.to_string(),
                timeframe: Timeframe::OneHour,
            })?;
        let s4h = s4h.unwrap_or_else(|| Series::empty(symbol, Timeframe::FourHour));
        let s1d = s1d.unwrap_or_else(|| Series::empty(symbol, Timeframe::OneDay));

        let aligned = build_aligned_features(&s1h, &s4h, &s1d);
        let Some(AlignedRow {
            timestamp, features, ..
        }) = aligned.last().copied()
        else {
            return Err(InferenceError::InsufficientData {
                symbol: symbol.to_string(),
            });
        };

        let probabilities = Horizon::ALL
            .iter()
            .map(|h| {
                let p = self
                    .load_ensemble(symbol, *h)
                    .map(|m| m.predict_vector(&features))
                    .unwrap_or(0.0);
                (*h, p)
            })
            .collect();

        Ok(ForecastResult {
            symbol: symbol.to_string(),
            as_of: timestamp,
            probabilities,
            features,
        })
    }

    /// Symbols with a stored 4H ensemble
    pub fn trained_symbols(&self) -> anyhow::Result<Vec<String>> {
        self.models.trained_symbols()
    }

    /// Writes `{SYMBOL}_mobile_pkg/` with the three ensembles and a manifest.
    /// All three must exist; the error names the first missing horizon.
    pub fn export_package(&self, symbol: &str) -> Result<PathBuf, ExportError> {
        let io = |e: anyhow::Error| ExportError::Io {
            symbol: symbol.to_string(),
            reason: format!("{:#}", e),
        };

        let mut models = Vec::with_capacity(Horizon::ALL.len());
        for horizon in Horizon::ALL {
            match self.models.load(symbol, horizon).map_err(io)? {
                Some(json) => models.push((horizon, json)),
                None => {
                    return Err(ExportError::MissingModel {
                        symbol: symbol.to_string(),
                        horizon,
                    });
                }
            }
        }

        self.packages
            .write_package(symbol, &models, &PackageManifest::for_symbol(symbol))
            .map_err(io)
    }

    /// Exports every trained symbol and copies the packages into a freshly
    /// emptied `mobile_exports/` directory. Symbols that fail are skipped;
    /// failing all of them is an error.
    pub fn export_all_packages(&self) -> Result<BulkExport, NoValidModelsError> {
        let symbols = self.trained_symbols().map_err(|e| NoValidModelsError {
            attempted: 0,
            failures: vec![format!("{:#}", e)],
        })?;
        let export_dir = self
            .packages
            .reset_export_dir()
            .map_err(|e| NoValidModelsError {
                attempted: symbols.len(),
                failures: vec![format!("{:#}", e)],
            })?;

        let mut exported = Vec::new();
        let mut failures = Vec::new();
        for symbol in &symbols {
            let result = self
                .export_package(symbol)
                .map_err(|e| e.to_string())
                .and_then(|pkg| {
                    self.packages
                        .copy_to_export(symbol, &pkg)
                        .map_err(|e| format!("{:#}", e))
                });
            match result {
                Ok(dest) => {
                    debug!("ForecastEngine: Copied {} package to {:?}", symbol, dest);
                    exported.push(symbol.clone());
                }
                Err(reason) => {
                    warn!("ForecastEngine: Failed to export {}: {}", symbol, reason);
                    failures.push((symbol.clone(), reason));
                }
            }
        }

        if exported.is_empty() {
            return Err(NoValidModelsError {
                attempted: symbols.len(),
                failures: failures
                    .into_iter()
                    .map(|(s, reason)| format!("{}: {}", s, reason))
                    .collect(),
            });
        }

        info!(
            "ForecastEngine: Exported {}/{} packages to {:?}",
            exported.len(),
            symbols.len(),
            export_dir
        );
        Ok(BulkExport {
            export_dir,
            exported,
            failures,
        })
    }

    /// Retires a symbol: its stored ensembles and its package directory.
    /// Returns the number of ensembles removed.
    pub fn delete_package(&self, symbol: &str) -> anyhow::Result<usize> {
        let removed = self.models.delete(symbol)?;
        let had_package = self.packages.delete_package(symbol)?;
        info!(
            "ForecastEngine: Deleted {} models for {} (package removed: {})",
            removed, symbol, had_package
        );
        Ok(removed)
    }

    fn load_series_set(&self, symbol: &str) -> anyhow::Result<[Option<Series>; 3]> {
        let mut set = [None, None, None];
        for (slot, tf) in set.iter_mut().zip(Timeframe::all()) {
            *slot = self.series.load(symbol, tf)?;
            if slot.is_none() && tf != Timeframe::OneHour {
                debug!("ForecastEngine: No {} cache for {}, using zeros", tf, symbol);
            }
        }
        Ok(set)
    }

    fn load_ensemble(&self, symbol: &str, horizon: Horizon) -> Option<TreeEnsemble> {
        let json = match self.models.load(symbol, horizon) {
            Ok(Some(json)) => json,
            Ok(None) => {
                warn!("ForecastEngine: No {} model for {}", horizon, symbol);
                return None;
            }
            Err(e) => {
                warn!("ForecastEngine: Failed to read {} model for {}: {:#}", horizon, symbol, e);
                return None;
            }
        };
        match TreeEnsemble::from_json_str(&json) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("ForecastEngine: Unreadable {} model for {}: {}", horizon, symbol, e);
                None
            }
        }
    }
}
