use crate::application::market_data::timeframe_aggregator::TimeframeAggregator;
use crate::domain::market::bar::{Bar, Series};
use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reproducible OHLCV generator for demos and tests.
///
/// Prices follow a bounded random walk; volume is a noisy baseline with
/// occasional spikes that coincide with larger moves, so the volume features
/// carry some signal.
#[derive(Debug, Clone)]
pub struct SyntheticSeriesGenerator {
    seed: u64,
    start_price: f64,
    base_volume: f64,
    /// Max absolute hourly return outside of spikes
    volatility: f64,
    start: DateTime<Utc>,
}

impl SyntheticSeriesGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            base_volume: 50_000.0,
            volatility: 0.006,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// `bars` consecutive 1H bars
    pub fn hourly(&self, symbol: &str, bars: usize) -> Series {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut close = self.start_price;
        let mut out = Vec::with_capacity(bars);

        for i in 0..bars {
            let spike = rng.random_range(0.0..1.0) < 0.08;
            let scale = if spike { 4.0 } else { 1.0 };
            let ret = rng.random_range(-self.volatility..=self.volatility) * scale + 0.0004;

            let open = close;
            close = (open * (1.0 + ret)).max(0.01);
            let wick = open.max(close) * rng.random_range(0.0..0.003);
            let high = open.max(close) + wick;
            let low = (open.min(close) - wick).max(0.0);

            let volume = self.base_volume
                * rng.random_range(0.6..1.4)
                * if spike { rng.random_range(2.5..5.0) } else { 1.0 };

            out.push(Bar::new(
                self.start + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume.round(),
            ));
        }

        Series::new(symbol, Timeframe::OneHour, out)
    }

    /// 1H series plus its 4H and 1D aggregates
    pub fn series_set(&self, symbol: &str, hourly_bars: usize) -> [Series; 3] {
        let hourly = self.hourly(symbol, hourly_bars);
        let four_hour = TimeframeAggregator::resample(&hourly, Timeframe::FourHour);
        let daily = TimeframeAggregator::resample(&hourly, Timeframe::OneDay);
        [hourly, four_hour, daily]
    }
}

impl Default for SyntheticSeriesGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticSeriesGenerator::new(7).hourly("SYN", 200);
        let b = SyntheticSeriesGenerator::new(7).hourly("SYN", 200);
        let c = SyntheticSeriesGenerator::new(8).hourly("SYN", 200);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bars_are_well_formed() {
        let series = SyntheticSeriesGenerator::default().hourly("SYN", 500);
        assert_eq!(series.len(), 500);
        for bar in series.bars() {
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.volume > 0.0);
            assert!(bar.close > 0.0);
        }
    }

    #[test]
    fn test_series_set_timeframes() {
        let [h1, h4, d1] = SyntheticSeriesGenerator::default().series_set("SYN", 96);
        assert_eq!(h1.timeframe, Timeframe::OneHour);
        assert_eq!(h4.len(), 24);
        assert_eq!(d1.len(), 4);
    }
}
