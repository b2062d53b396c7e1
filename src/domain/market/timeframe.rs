use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar cadences the forecaster trains on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Key used in cache file names (`{symbol}_{key}.csv`) and feature column suffixes
    pub fn key(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1H",
            Timeframe::FourHour => "4H",
            Timeframe::OneDay => "1D",
        }
    }

    /// Returns all timeframes in ascending order
    pub fn all() -> [Timeframe; 3] {
        [Timeframe::OneHour, Timeframe::FourHour, Timeframe::OneDay]
    }

    /// Returns the start timestamp (seconds) of the period containing the given timestamp
    ///
    /// # Arguments
    /// * `timestamp_sec` - Unix timestamp in seconds
    ///
    /// Periods are aligned to UTC: 4H buckets start at 00:00, 04:00, ... and
    /// daily buckets at midnight.
    pub fn period_start(&self, timestamp_sec: i64) -> i64 {
        let period_sec = self.to_seconds();
        timestamp_sec - timestamp_sec.rem_euclid(period_sec)
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1h" | "1hour" | "onehour" | "60m" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" | "daily" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1H, 4H, 1D",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneHour.to_minutes(), 60);
        assert_eq!(Timeframe::FourHour.to_minutes(), 240);
        assert_eq!(Timeframe::OneDay.to_minutes(), 1440);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("1H").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("4Hour").unwrap(), Timeframe::FourHour);
        assert_eq!(Timeframe::from_str("daily").unwrap(), Timeframe::OneDay);
        assert_eq!(Timeframe::from_str("1D").unwrap(), Timeframe::OneDay);
        assert!(Timeframe::from_str("15m").is_err());
    }

    #[test]
    fn test_period_start() {
        // 2024-01-01 00:00:00 UTC
        let base = 1_704_067_200i64;
        let tf = Timeframe::FourHour;

        assert_eq!(tf.period_start(base), base);
        assert_eq!(tf.period_start(base + 3 * 3600), base);
        assert_eq!(tf.period_start(base + 4 * 3600), base + 4 * 3600);
        assert_eq!(tf.period_start(base + 7 * 3600 + 59), base + 4 * 3600);

        assert_eq!(Timeframe::OneDay.period_start(base + 23 * 3600), base);
    }

    #[test]
    fn test_keys() {
        let keys: Vec<&str> = Timeframe::all().iter().map(|t| t.key()).collect();
        assert_eq!(keys, vec!["1H", "4H", "1D"]);
        assert_eq!(Timeframe::FourHour.to_string(), "4H");
    }
}
