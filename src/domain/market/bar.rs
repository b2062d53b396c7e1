use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Folds a later bar of the same period into this one.
    ///
    /// Open stays the first bar's open, high/low widen, close becomes the
    /// latest close and volume is summed.
    pub fn absorb(&mut self, later: &Bar) {
        if later.high > self.high {
            self.high = later.high;
        }
        if later.low < self.low {
            self.low = later.low;
        }
        self.close = later.close;
        self.volume += later.volume;
    }
}

/// Ordered bars for one symbol at one timeframe.
///
/// Bars are ascending by timestamp with unique timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesRecord")]
pub struct Series {
    pub symbol: String,
    pub timeframe: Timeframe,
    bars: Vec<Bar>,
}

/// Wire shape of a series; every deserialized series goes through `Series::new`
#[derive(Deserialize)]
struct SeriesRecord {
    symbol: String,
    timeframe: Timeframe,
    #[serde(default)]
    bars: Vec<Bar>,
}

impl From<SeriesRecord> for Series {
    fn from(record: SeriesRecord) -> Self {
        Series::new(record.symbol, record.timeframe, record.bars)
    }
}

impl Series {
    /// Builds a series, sorting by timestamp. When two bars share a timestamp
    /// the one that arrived later in `bars` wins.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut bars: Vec<Bar>) -> Self {
        // stable sort keeps arrival order among equal timestamps
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            timeframe,
            bars: deduped,
        }
    }

    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::new(symbol, timeframe, Vec::new())
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(hour: u32, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap();
        Bar::new(ts, close, close, close, close, 100.0)
    }

    #[test]
    fn test_series_sorts_ascending() {
        let series = Series::new(
            "AAPL",
            Timeframe::OneHour,
            vec![bar_at(3, 3.0), bar_at(1, 1.0), bar_at(2, 2.0)],
        );
        let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_timestamp_keeps_later_arrival() {
        let series = Series::new(
            "AAPL",
            Timeframe::OneHour,
            vec![bar_at(1, 1.0), bar_at(2, 2.0), bar_at(1, 9.0)],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 9.0);
    }

    #[test]
    fn test_deserialized_series_is_normalized() {
        let raw = serde_json::json!({
            "symbol": "AAPL",
            "timeframe": "OneHour",
            "bars": [bar_at(3, 3.0), bar_at(1, 1.0), bar_at(3, 7.0)],
        });
        let series: Series = serde_json::from_value(raw).unwrap();
        let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 7.0]);
    }

    #[test]
    fn test_absorb() {
        let mut first = Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            10.0,
            12.0,
            9.0,
            11.0,
            100.0,
        );
        let second = Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap(),
            11.0,
            13.0,
            10.0,
            12.5,
            50.0,
        );
        first.absorb(&second);
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 13.0);
        assert_eq!(first.low, 9.0);
        assert_eq!(first.close, 12.5);
        assert_eq!(first.volume, 150.0);
    }
}
