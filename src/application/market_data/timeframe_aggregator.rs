use crate::domain::market::bar::{Bar, Series};
use crate::domain::market::timeframe::Timeframe;
use chrono::{TimeZone, Utc};

/// Aggregates a finer series into a coarser timeframe.
///
/// Each bucket starts at the UTC period boundary containing its first bar;
/// the aggregated bar is stamped with that boundary. Buckets with no bars are
/// simply absent.
pub struct TimeframeAggregator;

impl TimeframeAggregator {
    /// Resample `series` into `target`.
    ///
    /// # Returns
    /// A new series at `target`. Resampling into the same or a finer timeframe
    /// returns a copy of the input.
    pub fn resample(series: &Series, target: Timeframe) -> Series {
        if target <= series.timeframe {
            return Series::new(series.symbol.clone(), target, series.bars().to_vec());
        }

        let mut completed: Vec<Bar> = Vec::new();
        let mut active: Option<(i64, Bar)> = None;

        for bar in series.bars() {
            let period_start = target.period_start(bar.timestamp.timestamp());

            match active.as_mut() {
                Some((start, current)) if *start == period_start => current.absorb(bar),
                _ => {
                    if let Some((_, done)) = active.take() {
                        completed.push(done);
                    }
                    let stamp = Utc
                        .timestamp_opt(period_start, 0)
                        .single()
                        .unwrap_or(bar.timestamp);
                    active = Some((period_start, Bar { timestamp: stamp, ..*bar }));
                }
            }
        }

        if let Some((_, done)) = active {
            completed.push(done);
        }

        Series::new(series.symbol.clone(), target, completed)
    }
}
