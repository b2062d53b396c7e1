use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forecast distance. Each horizon gets its own ensemble and label rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "2D")]
    TwoDays,
    #[serde(rename = "5D")]
    FiveDays,
}

/// Label rule for one horizon: `Close[i + lookahead] > Close[i] * (1 + threshold)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonSpec {
    pub horizon: Horizon,
    /// Lookahead in 1H bars
    pub lookahead: usize,
    /// Fractional move required, e.g. 0.015 for 1.5%
    pub threshold: f64,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::FourHours, Horizon::TwoDays, Horizon::FiveDays];

    pub fn key(&self) -> &'static str {
        match self {
            Horizon::FourHours => "4H",
            Horizon::TwoDays => "2D",
            Horizon::FiveDays => "5D",
        }
    }

    /// Fixed label parameters. "2 days" and "5 days" assume ~7 1H bars per
    /// trading day.
    pub fn spec(&self) -> HorizonSpec {
        match self {
            Horizon::FourHours => HorizonSpec {
                horizon: *self,
                lookahead: 4,
                threshold: 0.015,
            },
            Horizon::TwoDays => HorizonSpec {
                horizon: *self,
                lookahead: 14,
                threshold: 0.030,
            },
            Horizon::FiveDays => HorizonSpec {
                horizon: *self,
                lookahead: 35,
                threshold: 0.050,
            },
        }
    }

    /// File name of this horizon's ensemble inside an exported package
    pub fn package_file_name(&self) -> String {
        format!("model_{}.json", self.key())
    }
}

impl FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "4H" => Ok(Horizon::FourHours),
            "2D" => Ok(Horizon::TwoDays),
            "5D" => Ok(Horizon::FiveDays),
            _ => Err(anyhow!("Invalid horizon: '{}'. Valid options: 4H, 2D, 5D", s)),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
