//! Feature construction for the horizon ensembles.
//!
//! Per timeframe, each bar gets a volume z-score, a price elasticity and the
//! calendar fields of its timestamp. The 4H and 1D tables are then carried onto
//! the 1H timeline with last-known-value forward fill.

use crate::application::market_data::statistical_features::{
    ON_DEVICE_VOLUME_WINDOW, TRAINING_VOLUME_WINDOW, elasticity, pct_changes, rolling_zscores,
};
use crate::application::market_data::timeframe_aggregator::TimeframeAggregator;
use crate::domain::market::bar::Series;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::feature_registry::FeatureVector;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;

/// Derived values for one bar of one timeframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub vol_z: f64,
    pub elasticity: f64,
    /// Monday = 0 .. Sunday = 6
    pub day_of_week: u32,
    pub hour_of_day: u32,
}

/// Feature rows parallel to the bars of one series
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row of the 1H timeline after the coarser timeframes were merged in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub features: FeatureVector,
}

/// Builds features with the training window (20 bars).
pub fn compute_features(series: &Series) -> FeatureTable {
    compute_features_with_window(series, TRAINING_VOLUME_WINDOW)
}

/// Builds features with an explicit volume window.
///
/// Empty input yields an empty table. Every value is finite.
pub fn compute_features_with_window(series: &Series, window: usize) -> FeatureTable {
    let bars = series.bars();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let vol_z = rolling_zscores(&volumes, window);
    let returns = pct_changes(&closes);

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            timestamp: bar.timestamp,
            close: bar.close,
            vol_z: vol_z[i],
            elasticity: elasticity(returns[i], vol_z[i]),
            day_of_week: bar.timestamp.weekday().num_days_from_monday(),
            hour_of_day: bar.timestamp.hour(),
        })
        .collect();

    FeatureTable {
        symbol: series.symbol.clone(),
        timeframe: series.timeframe,
        rows,
    }
}

/// Value of `table` most recently known at each timestamp of `timeline`.
///
/// Timestamps before the first coarser row (or an empty table) get 0.
fn forward_fill_vol_z(timeline: &[FeatureRow], table: &FeatureTable) -> Vec<f64> {
    let mut filled = Vec::with_capacity(timeline.len());
    let mut cursor = 0usize;
    let mut last_known: Option<f64> = None;

    for row in timeline {
        while cursor < table.rows.len() && table.rows[cursor].timestamp <= row.timestamp {
            last_known = Some(table.rows[cursor].vol_z);
            cursor += 1;
        }
        filled.push(last_known.unwrap_or(0.0));
    }
    filled
}

/// Merges the 4H and 1D volume z-scores onto the 1H timeline.
///
/// The output has exactly one row per 1H row.
pub fn align_timeframes(
    table_1h: &FeatureTable,
    table_4h: &FeatureTable,
    table_1d: &FeatureTable,
) -> Vec<AlignedRow> {
    let vol_z_4h = forward_fill_vol_z(&table_1h.rows, table_4h);
    let vol_z_1d = forward_fill_vol_z(&table_1h.rows, table_1d);

    table_1h
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| AlignedRow {
            timestamp: row.timestamp,
            close: row.close,
            features: FeatureVector {
                vol_z_1h: row.vol_z,
                vol_z_4h: vol_z_4h[i],
                vol_z_1d: vol_z_1d[i],
                elasticity_1h: row.elasticity,
                day_of_week: row.day_of_week as f64,
                hour_of_day: row.hour_of_day as f64,
            },
        })
        .collect()
}

/// Features for the three cached series, aligned onto the 1H timeline
pub fn build_aligned_features(
    series_1h: &Series,
    series_4h: &Series,
    series_1d: &Series,
) -> Vec<AlignedRow> {
    align_timeframes(
        &compute_features(series_1h),
        &compute_features(series_4h),
        &compute_features(series_1d),
    )
}

/// Evaluator input built from a single 1H series, the way the on-device
/// client does it: 60-bar windows, 4H and 1D bars resampled from the 1H
/// input, and the last row of each table.
pub fn latest_feature_snapshot(series_1h: &Series) -> FeatureVector {
    let Some(last) = series_1h.last() else {
        return FeatureVector::default();
    };

    let table_1h = compute_features_with_window(series_1h, ON_DEVICE_VOLUME_WINDOW);
    let last_vol_z = |tf: Timeframe| {
        let resampled = TimeframeAggregator::resample(series_1h, tf);
        compute_features_with_window(&resampled, ON_DEVICE_VOLUME_WINDOW)
            .rows
            .last()
            .map(|r| r.vol_z)
            .unwrap_or(0.0)
    };

    let latest = table_1h.rows.last();
    FeatureVector {
        vol_z_1h: latest.map(|r| r.vol_z).unwrap_or(0.0),
        vol_z_4h: last_vol_z(Timeframe::FourHour),
        vol_z_1d: last_vol_z(Timeframe::OneDay),
        elasticity_1h: latest.map(|r| r.elasticity).unwrap_or(0.0),
        day_of_week: last.timestamp.weekday().num_days_from_monday() as f64,
        hour_of_day: last.timestamp.hour() as f64,
    }
}

/// `latest_feature_snapshot` keyed by the canonical feature names
pub fn latest_feature_map(series_1h: &Series) -> HashMap<String, f64> {
    latest_feature_snapshot(series_1h)
        .named()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::bar::Bar;
    use chrono::TimeZone;

    fn series(tf: Timeframe, start: DateTime<Utc>, step_hours: i64, volumes: &[f64]) -> Series {
        let bars = volumes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let close = 100.0 + i as f64;
                Bar::new(
                    start + chrono::Duration::hours(step_hours * i as i64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    *v,
                )
            })
            .collect();
        Series::new("TEST", tf, bars)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_series_gives_empty_table() {
        let table = compute_features(&Series::empty("TEST", Timeframe::OneHour));
        assert!(table.is_empty());
    }

    #[test]
    fn test_constant_volume_zero_zscore_and_plain_elasticity() {
        let s = series(Timeframe::OneHour, start(), 1, &[500.0; 40]);
        let table = compute_features(&s);
        assert_eq!(table.len(), 40);
        for (i, row) in table.rows.iter().enumerate() {
            assert_eq!(row.vol_z, 0.0);
            if i > 0 {
                // z-score 0 is treated as 1, so elasticity equals the raw return
                let expected = 1.0 / (100.0 + (i - 1) as f64);
                assert!((row.elasticity - expected).abs() < 1e-12);
            }
        }
        assert_eq!(table.rows[0].elasticity, 0.0);
    }

    #[test]
    fn test_calendar_fields() {
        // 2024-01-01 is a Monday
        let s = series(Timeframe::OneHour, start(), 1, &[1.0; 30]);
        let table = compute_features(&s);
        assert_eq!(table.rows[0].day_of_week, 0);
        assert_eq!(table.rows[0].hour_of_day, 0);
        assert_eq!(table.rows[25].day_of_week, 1);
        assert_eq!(table.rows[25].hour_of_day, 1);
    }

    #[test]
    fn test_forward_fill_alignment() {
        let vols_1h: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let s1h = series(Timeframe::OneHour, start() + chrono::Duration::hours(2), 1, &vols_1h);
        // 4H bars at 04:00, 08:00 with rising volume
        let s4h = series(
            Timeframe::FourHour,
            start() + chrono::Duration::hours(4),
            4,
            &[10.0, 30.0],
        );
        let empty_1d = compute_features(&Series::empty("TEST", Timeframe::OneDay));

        let t4h = compute_features(&s4h);
        let aligned = align_timeframes(&compute_features(&s1h), &t4h, &empty_1d);

        assert_eq!(aligned.len(), 12);
        // 02:00, 03:00 precede the first 4H row
        assert_eq!(aligned[0].features.vol_z_4h, 0.0);
        assert_eq!(aligned[1].features.vol_z_4h, 0.0);
        // 04:00 .. 07:00 carry the first 4H value
        assert_eq!(aligned[2].features.vol_z_4h, t4h.rows[0].vol_z);
        assert_eq!(aligned[5].features.vol_z_4h, t4h.rows[0].vol_z);
        // 08:00 onwards carry the second
        assert_eq!(aligned[6].features.vol_z_4h, t4h.rows[1].vol_z);
        assert_eq!(aligned[11].features.vol_z_4h, t4h.rows[1].vol_z);
        // missing daily series fills with zeros
        assert!(aligned.iter().all(|r| r.features.vol_z_1d == 0.0));
    }

    #[test]
    fn test_adversarial_inputs_stay_finite() {
        let bars: Vec<Bar> = (0..80)
            .map(|i| {
                let close = match i % 4 {
                    0 => 1e-300,
                    1 => 0.0,
                    2 => 1e300,
                    _ => 5.0,
                };
                let volume = match i % 3 {
                    0 => 0.0,
                    1 => 1e-310,
                    _ => 1e-12,
                };
                Bar::new(
                    start() + chrono::Duration::hours(i),
                    close,
                    close,
                    close,
                    close,
                    volume,
                )
            })
            .collect();
        let s = Series::new("ADV", Timeframe::OneHour, bars);

        let aligned = build_aligned_features(&s, &s, &s);
        assert_eq!(aligned.len(), 80);
        assert!(aligned.iter().all(|r| r.features.is_finite()));
        assert!(latest_feature_snapshot(&s).is_finite());
    }

    #[test]
    fn test_snapshot_of_empty_series_is_zero() {
        let snapshot = latest_feature_snapshot(&Series::empty("TEST", Timeframe::OneHour));
        assert_eq!(snapshot, FeatureVector::default());
    }

    #[test]
    fn test_snapshot_uses_last_bar_calendar() {
        let s = series(Timeframe::OneHour, start(), 1, &[10.0; 100]);
        let snapshot = latest_feature_snapshot(&s);
        // 99 hours after Monday 00:00 is Friday 03:00
        assert_eq!(snapshot.day_of_week, 4.0);
        assert_eq!(snapshot.hour_of_day, 3.0);
        assert_eq!(snapshot.vol_z_1h, 0.0);

        let named = latest_feature_map(&s);
        assert_eq!(named.len(), 6);
        assert_eq!(named["day_of_week"], 4.0);
        assert_eq!(named["Vol_Z_1D"], snapshot.vol_z_1d);
    }
}
