//! In-Memory Repository Implementations
//!
//! Thread-safe implementations of the storage traits in
//! `domain::repositories`, backed by `Arc<RwLock<HashMap>>`.
//!
//! Contents are lost when the process exits. They back unit tests and the
//! engine's dry runs; the file-backed stores live in
//! `infrastructure::persistence`.

use crate::domain::market::bar::Series;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::horizon::Horizon;
use crate::domain::repositories::{ModelRepository, SeriesRepository};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("repository lock poisoned")
}

/// In-memory implementation of SeriesRepository
#[derive(Clone, Default)]
pub struct InMemorySeriesRepository {
    series: Arc<RwLock<HashMap<(String, Timeframe), Series>>>,
}

impl InMemorySeriesRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeriesRepository for InMemorySeriesRepository {
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Series>> {
        let series = self.series.read().map_err(poisoned)?;
        Ok(series.get(&(symbol.to_string(), timeframe)).cloned())
    }

    fn save(&self, series: &Series) -> Result<()> {
        self.series
            .write()
            .map_err(poisoned)?
            .insert((series.symbol.clone(), series.timeframe), series.clone());
        Ok(())
    }

    fn symbols(&self, timeframe: Timeframe) -> Result<Vec<String>> {
        let series = self.series.read().map_err(poisoned)?;
        let mut symbols: Vec<String> = series
            .keys()
            .filter(|(_, tf)| *tf == timeframe)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// In-memory implementation of ModelRepository
#[derive(Clone, Default)]
pub struct InMemoryModelRepository {
    models: Arc<RwLock<HashMap<(String, Horizon), String>>>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelRepository for InMemoryModelRepository {
    fn load(&self, symbol: &str, horizon: Horizon) -> Result<Option<String>> {
        let models = self.models.read().map_err(poisoned)?;
        Ok(models.get(&(symbol.to_string(), horizon)).cloned())
    }

    fn save(&self, symbol: &str, horizon: Horizon, model_json: &str) -> Result<()> {
        self.models
            .write()
            .map_err(poisoned)?
            .insert((symbol.to_string(), horizon), model_json.to_string());
        Ok(())
    }

    fn delete(&self, symbol: &str) -> Result<usize> {
        let mut models = self.models.write().map_err(poisoned)?;
        let before = models.len();
        models.retain(|(s, _), _| s != symbol);
        Ok(before - models.len())
    }

    fn trained_symbols(&self) -> Result<Vec<String>> {
        let models = self.models.read().map_err(poisoned)?;
        let mut symbols: Vec<String> = models
            .keys()
            .filter(|(_, h)| *h == Horizon::FourHours)
            .map(|(s, _)| s.clone())
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}
