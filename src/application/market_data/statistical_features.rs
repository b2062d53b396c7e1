//! Rolling statistics used by the feature builder
//!
//! Degenerate inputs never produce NaN or infinity here:
//! - windows shorter than requested use whatever rows exist (minimum 1)
//! - a zero (or undefined) standard deviation is replaced by 1
//! - non-finite results are replaced by 0

use statrs::statistics::{Data, Distribution};

/// Volume z-score window used when building training features (1H bars)
pub const TRAINING_VOLUME_WINDOW: usize = 20;

/// Volume z-score window used by the on-device feature snapshot
pub const ON_DEVICE_VOLUME_WINDOW: usize = 60;

/// Replaces NaN and ±infinity with the neutral value 0
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Trailing window ending at `end_idx` (inclusive), truncated at the series start
fn trailing_window(values: &[f64], end_idx: usize, window: usize) -> &[f64] {
    let start = (end_idx + 1).saturating_sub(window.max(1));
    &values[start..=end_idx]
}

/// Mean and sample standard deviation of a window.
///
/// The deviation is `None` when it is undefined (single sample) or not finite.
pub fn mean_and_std(window: &[f64]) -> (Option<f64>, Option<f64>) {
    if window.is_empty() {
        return (None, None);
    }
    let data = Data::new(window.to_vec());
    let mean = data.mean().filter(|m| m.is_finite());
    let std_dev = data.std_dev().filter(|s| s.is_finite());
    (mean, std_dev)
}

/// Rolling z-score of every value against its trailing window.
///
/// `z[i] = (v[i] - mean) / std` with std 0 (or undefined) substituted by 1,
/// so a flat window yields exactly 0.
pub fn rolling_zscores(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let (mean, std_dev) = mean_and_std(trailing_window(values, i, window));
            let mean = mean.unwrap_or(values[i]);
            let std_dev = match std_dev {
                Some(s) if s != 0.0 => s,
                _ => 1.0,
            };
            sanitize((values[i] - mean) / std_dev)
        })
        .collect()
}

/// Fractional change from the previous value. The first entry has no
/// predecessor and is 0; divisions by zero sanitize to 0.
pub fn pct_changes(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(0.0);
        } else {
            out.push(sanitize((values[i] - values[i - 1]) / values[i - 1]));
        }
    }
    out
}

/// Price elasticity: return divided by the volume z-score, where a zero
/// z-score is treated as 1. Blow-ups sanitize to 0.
pub fn elasticity(price_return: f64, volume_z: f64) -> f64 {
    let denominator = if volume_z == 0.0 { 1.0 } else { volume_z };
    sanitize(price_return / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_values_have_zero_zscore() {
        let volumes = vec![1_000.0; 50];
        let z = rolling_zscores(&volumes, TRAINING_VOLUME_WINDOW);
        assert_eq!(z.len(), 50);
        assert!(z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_partial_window_first_row_is_zero() {
        let z = rolling_zscores(&[5.0, 10.0], 20);
        // single-sample window: mean == value, std undefined -> 1
        assert_eq!(z[0], 0.0);
        // two-sample window [5, 10]: mean 7.5, sample std ~3.5355
        assert!((z[1] - 2.5 / 3.5355339).abs() < 1e-6);
    }

    #[test]
    fn test_window_slides() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let z = rolling_zscores(&values, 3);
        // window [27, 28, 29]: mean 28, std 1
        assert!((z[29] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pct_changes_handles_zero_price() {
        let changes = pct_changes(&[0.0, 10.0, 11.0]);
        assert_eq!(changes[0], 0.0);
        assert_eq!(changes[1], 0.0); // 10 / 0 -> inf -> 0
        assert!((changes[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_elasticity_guards() {
        assert_eq!(elasticity(0.02, 0.0), 0.02);
        assert_eq!(elasticity(0.02, 2.0), 0.01);
        assert_eq!(elasticity(0.02, 1e-320), 0.0);
        assert_eq!(elasticity(f64::NAN, 1.0), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(rolling_zscores(&[], 20).is_empty());
        assert!(pct_changes(&[]).is_empty());
        assert_eq!(mean_and_std(&[]), (None, None));
    }
}
