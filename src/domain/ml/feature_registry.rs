use serde::{Deserialize, Serialize};

/// Ordered list of feature names.
/// This order MUST match the column order the ensembles were trained on and
/// the `inputs` list written into every exported package manifest.
/// Any change here is a breaking change for exported models.
pub const FEATURE_NAMES: [&str; 6] = [
    "Vol_Z_1H",
    "Vol_Z_4H",
    "Vol_Z_1D",
    "Elasticity_1H",
    "day_of_week",
    "hour_of_day",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// One aligned row of model inputs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub vol_z_1h: f64,
    pub vol_z_4h: f64,
    pub vol_z_1d: f64,
    pub elasticity_1h: f64,
    pub day_of_week: f64,
    pub hour_of_day: f64,
}

impl FeatureVector {
    /// Values in `FEATURE_NAMES` order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.vol_z_1h,
            self.vol_z_4h,
            self.vol_z_1d,
            self.elasticity_1h,
            self.day_of_week,
            self.hour_of_day,
        ]
    }

    /// Named pairs, used to feed evaluators that order inputs by manifest names
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.to_array())
            .collect()
    }

    /// True when every feature is finite
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}
