use crate::domain::market::bar::{Bar, Series};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::SeriesRepository;
use crate::infrastructure::persistence::write_atomic;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CsvBar {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}

/// Accepts RFC 3339 as written by this store, plus the naive
/// `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD` forms older caches used (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Series cache as one CSV file per symbol and timeframe:
/// `{data_dir}/{SYMBOL}_{1H|4H|1D}.csv` with `Date,Open,High,Low,Close,Volume`.
pub struct CsvSeriesRepository {
    data_dir: PathBuf,
}

impl CsvSeriesRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", symbol, timeframe.key()))
    }
}

impl SeriesRepository for CsvSeriesRepository {
    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Series>> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open series cache {}", path.display()))?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;
        for record in reader.deserialize::<CsvBar>() {
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    debug!("Skipping unreadable row in {}: {}", path.display(), e);
                    skipped += 1;
                    continue;
                }
            };
            match parse_timestamp(&row.date) {
                Some(ts) => bars.push(Bar::new(ts, row.open, row.high, row.low, row.close, row.volume)),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                "Series cache {}: skipped {} malformed rows",
                path.display(),
                skipped
            );
        }

        Ok(Some(Series::new(symbol, timeframe, bars)))
    }

    fn save(&self, series: &Series) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for bar in series.bars() {
            writer.serialize(CsvBar {
                date: bar.timestamp.to_rfc3339(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {}", e))?;

        write_atomic(&self.path_for(&series.symbol, series.timeframe), &buffer)
    }

    fn symbols(&self, timeframe: Timeframe) -> Result<Vec<String>> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }
        let suffix = format!("_{}.csv", timeframe.key());
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.data_dir)
            .with_context(|| format!("Failed to list {}", self.data_dir.display()))?
        {
            let name = entry?.file_name();
            if let Some(symbol) = name.to_str().and_then(|n| n.strip_suffix(&suffix)) {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
