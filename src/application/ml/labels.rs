use crate::application::feature_engineering_service::AlignedRow;
use crate::domain::ml::feature_registry::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
use crate::domain::ml::horizon::HorizonSpec;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// A feature row paired with its binary target for one horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledRow {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub target: u8,
}

/// Labels aligned rows for one horizon.
///
/// `target = 1` iff `close[i + lookahead] > close[i] * (1 + threshold)`.
/// The last `lookahead` rows have no future close and are dropped, so the
/// output holds `max(0, N - lookahead)` rows.
pub fn construct_labels(rows: &[AlignedRow], spec: HorizonSpec) -> Vec<LabeledRow> {
    if rows.len() <= spec.lookahead {
        return Vec::new();
    }

    rows.iter()
        .zip(rows.iter().skip(spec.lookahead))
        .map(|(current, future)| LabeledRow {
            timestamp: current.timestamp,
            features: current.features,
            target: u8::from(future.close > current.close * (1.0 + spec.threshold)),
        })
        .collect()
}

/// Fraction of positive targets, 0 for an empty set
pub fn positive_rate(rows: &[LabeledRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let positives = rows.iter().filter(|r| r.target == 1).count();
    positives as f64 / rows.len() as f64
}

/// Row-major feature matrix and target vector for the learner
pub fn to_matrix(rows: &[LabeledRow]) -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
    let x = rows.iter().map(|r| r.features.to_array()).collect();
    let y = rows.iter().map(|r| r.target as f64).collect();
    (x, y)
}

/// Dumps a labeled set as CSV (`timestamp`, the feature columns, `target`)
pub fn write_dataset_csv(rows: &[LabeledRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create dataset file {}", path.display()))?;

    let mut header = vec!["timestamp"];
    header.extend_from_slice(&FEATURE_NAMES);
    header.push("target");
    writer.write_record(&header)?;

    for row in rows {
        let mut record = Vec::with_capacity(FEATURE_COUNT + 2);
        record.push(row.timestamp.to_rfc3339());
        record.extend(row.features.to_array().iter().map(|v| v.to_string()));
        record.push(row.target.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
