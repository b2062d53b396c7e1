//! Repository Pattern Abstractions
//!
//! Storage traits the forecasting core calls into. The core never touches the
//! filesystem directly for series or models; it goes through:
//! - `SeriesRepository`: OHLCV caches keyed by `{symbol}_{timeframe}`
//! - `ModelRepository`: serialized ensembles keyed by `{symbol}_{horizon}`
//!
//! File-backed implementations live in `infrastructure::persistence`, in-memory
//! ones in `infrastructure::repositories`.

use crate::domain::market::bar::Series;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::horizon::Horizon;
use anyhow::Result;

pub trait SeriesRepository: Send + Sync {
    /// Returns `None` when no cache exists for this symbol/timeframe
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Series>>;

    /// Replaces the cache for `series.symbol` at `series.timeframe`
    fn save(&self, series: &Series) -> Result<()>;

    /// Symbols with a cached series at this timeframe
    fn symbols(&self, timeframe: Timeframe) -> Result<Vec<String>>;
}

pub trait ModelRepository: Send + Sync {
    /// Serialized ensemble text, `None` when the horizon was never trained
    fn load(&self, symbol: &str, horizon: Horizon) -> Result<Option<String>>;

    /// Stores an ensemble, replacing any previous one (last writer wins)
    fn save(&self, symbol: &str, horizon: Horizon, model_json: &str) -> Result<()>;

    /// Removes every horizon for the symbol, returns how many were removed
    fn delete(&self, symbol: &str) -> Result<usize>;

    /// Symbols that have a 4H ensemble
    fn trained_symbols(&self) -> Result<Vec<String>>;
}
