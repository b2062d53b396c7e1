//! Signal classification over per-horizon probabilities.
//!
//! Probabilities arrive as percentages (0-100) keyed by horizon:
//! - COMBO: 4H and 5D both strong, actionable now
//! - SCALP: only 4H strong, short-term trade
//! - WATCH: only 5D strong, monitor
//! - AVOID: every horizon weak
//! - NEUTRAL: anything else

use crate::domain::ml::horizon::Horizon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Percent thresholds driving the classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SignalThresholds {
    #[serde(rename = "COMBO_4H")]
    pub combo_4h: f64,
    #[serde(rename = "COMBO_5D")]
    pub combo_5d: f64,
    #[serde(rename = "SCALP_4H")]
    pub scalp_4h: f64,
    #[serde(rename = "WATCH_5D")]
    pub watch_5d: f64,
    pub avoid: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            combo_4h: 70.0,
            combo_5d: 60.0,
            scalp_4h: 70.0,
            watch_5d: 60.0,
            avoid: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Combo,
    Scalp,
    Watch,
    Avoid,
    Neutral,
}

impl SignalKind {
    /// Sort priority, higher is more important
    pub fn priority(&self) -> u8 {
        match self {
            SignalKind::Combo => 4,
            SignalKind::Scalp => 3,
            SignalKind::Watch => 2,
            SignalKind::Neutral => 1,
            SignalKind::Avoid => 0,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Combo => "COMBO",
            SignalKind::Scalp => "SCALP",
            SignalKind::Watch => "WATCH",
            SignalKind::Avoid => "AVOID",
            SignalKind::Neutral => "NEUTRAL",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub kind: SignalKind,
    pub is_actionable: bool,
    /// Percent confidence attached to the classification
    pub confidence: f64,
}

pub struct SignalFilter;

impl SignalFilter {
    /// Classifies horizon percentages. Missing horizons count as 0%.
    pub fn evaluate(probs: &BTreeMap<Horizon, f64>, thresholds: &SignalThresholds) -> SignalResult {
        let p4h = probs.get(&Horizon::FourHours).copied().unwrap_or(0.0);
        let p2d = probs.get(&Horizon::TwoDays).copied().unwrap_or(0.0);
        let p5d = probs.get(&Horizon::FiveDays).copied().unwrap_or(0.0);
        let avg = (p4h + p2d + p5d) / 3.0;

        if p4h >= thresholds.combo_4h && p5d >= thresholds.combo_5d {
            return SignalResult {
                kind: SignalKind::Combo,
                is_actionable: true,
                confidence: avg,
            };
        }

        if p4h >= thresholds.scalp_4h {
            return SignalResult {
                kind: SignalKind::Scalp,
                is_actionable: true,
                confidence: p4h,
            };
        }

        if p5d >= thresholds.watch_5d {
            return SignalResult {
                kind: SignalKind::Watch,
                is_actionable: false,
                confidence: p5d,
            };
        }

        let avoid = thresholds.avoid;
        if p4h < avoid && p2d < avoid && p5d < avoid {
            return SignalResult {
                kind: SignalKind::Avoid,
                is_actionable: false,
                confidence: avg,
            };
        }

        SignalResult {
            kind: SignalKind::Neutral,
            is_actionable: false,
            confidence: avg,
        }
    }
}
