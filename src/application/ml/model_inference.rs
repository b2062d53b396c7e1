//! Package-based inference for hosts that only receive exported packages.
//!
//! Packages live under `models_dir` as `{SYMBOL}_mobile_pkg/` (preferred) or
//! `{SYMBOL}_pkg/`, with `.` in the symbol written as `_`. Each holds one
//! `model_{H}.json` per horizon plus a `features.json` manifest.

use crate::application::ml::tree_ensemble::{TreeEnsemble, to_percent};
use crate::domain::ml::feature_registry::FEATURE_NAMES;
use crate::domain::ml::horizon::Horizon;
use crate::domain::ml::manifest::{MANIFEST_FILE_NAME, manifest_inputs};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MOBILE_PACKAGE_SUFFIX: &str = "_mobile_pkg";
const PACKAGE_SUFFIX: &str = "_pkg";

/// Where a horizon's model stands for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    /// Parsed and held in memory
    Loaded,
    /// On disk but not loaded
    Available,
    Missing,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelStatus::Loaded => "loaded",
            ModelStatus::Available => "available",
            ModelStatus::Missing => "missing",
        };
        write!(f, "{}", s)
    }
}

fn file_safe(symbol: &str) -> String {
    symbol.replace('.', "_")
}

/// Symbol a package directory name maps back to, if it is a package at all
fn symbol_from_dir_name(name: &str) -> Option<String> {
    let stem = name
        .strip_suffix(MOBILE_PACKAGE_SUFFIX)
        .or_else(|| name.strip_suffix(PACKAGE_SUFFIX))?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('_', "."))
}

pub struct ModelInference {
    models_dir: PathBuf,
    models: HashMap<(String, Horizon), TreeEnsemble>,
    feature_order: HashMap<String, Vec<String>>,
}

impl ModelInference {
    /// Opens (and creates if needed) the models directory
    pub fn new(models_dir: impl Into<PathBuf>) -> Result<Self> {
        let models_dir = models_dir.into();
        fs::create_dir_all(&models_dir).with_context(|| {
            format!("Failed to create models directory {}", models_dir.display())
        })?;
        Ok(Self {
            models_dir,
            models: HashMap::new(),
            feature_order: HashMap::new(),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Package directory for a symbol, preferring the mobile layout
    pub fn package_dir(&self, symbol: &str) -> PathBuf {
        let safe = file_safe(symbol);
        let mobile = self
            .models_dir
            .join(format!("{}{}", safe, MOBILE_PACKAGE_SUFFIX));
        if mobile.exists() {
            mobile
        } else {
            self.models_dir.join(format!("{}{}", safe, PACKAGE_SUFFIX))
        }
    }

    /// Loads every horizon available for `symbol`.
    ///
    /// A missing or malformed file marks that horizon `false`; nothing here
    /// is fatal.
    pub fn load_models(&mut self, symbol: &str) -> BTreeMap<Horizon, bool> {
        let pkg = self.package_dir(symbol);
        let mut results = BTreeMap::new();

        for horizon in Horizon::ALL {
            let path = pkg.join(horizon.package_file_name());
            if !path.exists() {
                results.insert(horizon, false);
                continue;
            }

            let loaded = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| TreeEnsemble::from_json_str(&text).map_err(|e| e.to_string()));

            match loaded {
                Ok(model) => {
                    info!(
                        "ModelInference: Loaded {} {} ({} trees)",
                        symbol,
                        horizon,
                        model.num_trees()
                    );
                    self.models.insert((symbol.to_string(), horizon), model);
                    results.insert(horizon, true);
                }
                Err(e) => {
                    warn!("ModelInference: Failed to load {} {}: {}", symbol, horizon, e);
                    results.insert(horizon, false);
                }
            }
        }

        let manifest_path = pkg.join(MANIFEST_FILE_NAME);
        if manifest_path.exists() {
            match fs::read_to_string(&manifest_path)
                .map_err(anyhow::Error::from)
                .and_then(|text| Ok(serde_json::from_str::<serde_json::Value>(&text)?))
                .map(|manifest| manifest_inputs(&manifest))
            {
                Ok(inputs) if !inputs.is_empty() => {
                    self.feature_order.insert(symbol.to_string(), inputs);
                }
                Ok(_) => debug!("ModelInference: Manifest for {} lists no inputs", symbol),
                Err(e) => warn!("ModelInference: Ignoring unreadable manifest for {}: {}", symbol, e),
            }
        }

        results
    }

    /// Feature order for a symbol: the manifest's, else the canonical one
    pub fn feature_order(&self, symbol: &str) -> Vec<String> {
        self.feature_order
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| FEATURE_NAMES.iter().map(|s| s.to_string()).collect())
    }

    /// Scores named features for every horizon, as percentages with one
    /// decimal. Unloaded horizons report 0.0; features the map lacks read as 0.0.
    pub fn predict(&self, symbol: &str, features: &HashMap<String, f64>) -> BTreeMap<Horizon, f64> {
        let vector: Vec<f64> = self
            .feature_order(symbol)
            .iter()
            .map(|name| features.get(name).copied().unwrap_or(0.0))
            .collect();

        Horizon::ALL
            .iter()
            .map(|h| {
                let pct = self
                    .models
                    .get(&(symbol.to_string(), *h))
                    .map(|m| to_percent(m.predict_proba(&vector)))
                    .unwrap_or(0.0);
                (*h, pct)
            })
            .collect()
    }

    pub fn has_models(&self, symbol: &str) -> bool {
        Horizon::ALL
            .iter()
            .any(|h| self.models.contains_key(&(symbol.to_string(), *h)))
    }

    pub fn model_status(&self, symbol: &str) -> BTreeMap<Horizon, ModelStatus> {
        let pkg = self.package_dir(symbol);
        Horizon::ALL
            .iter()
            .map(|h| {
                let status = if self.models.contains_key(&(symbol.to_string(), *h)) {
                    ModelStatus::Loaded
                } else if pkg.join(h.package_file_name()).exists() {
                    ModelStatus::Available
                } else {
                    ModelStatus::Missing
                };
                (*h, status)
            })
            .collect()
    }

    /// Symbols with a package directory, sorted and de-duplicated
    pub fn list_available_symbols(&self) -> Result<Vec<String>> {
        let mut symbols = BTreeSet::new();
        for (name, _) in self.package_dirs()? {
            if let Some(symbol) = symbol_from_dir_name(&name) {
                symbols.insert(symbol);
            }
        }
        Ok(symbols.into_iter().collect())
    }

    /// Removes every package directory that maps to `symbol` and drops its
    /// loaded models. Returns whether anything was deleted.
    pub fn delete_model_package(&mut self, symbol: &str) -> Result<bool> {
        for horizon in Horizon::ALL {
            self.models.remove(&(symbol.to_string(), horizon));
        }
        self.feature_order.remove(symbol);

        let mut deleted = false;
        for (name, path) in self.package_dirs()? {
            if symbol_from_dir_name(&name).as_deref() != Some(symbol) {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    info!("ModelInference: Deleted model package {}", path.display());
                    deleted = true;
                }
                Err(e) => warn!("ModelInference: Failed to delete {}: {}", path.display(), e),
            }
        }
        Ok(deleted)
    }

    pub fn clear_models(&mut self) {
        self.models.clear();
        self.feature_order.clear();
    }

    fn package_dirs(&self) -> Result<Vec<(String, PathBuf)>> {
        if !self.models_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.models_dir)
            .with_context(|| format!("Failed to list {}", self.models_dir.display()))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dirs.push((name.to_string(), path.clone()));
            }
        }
        Ok(dirs)
    }
}
