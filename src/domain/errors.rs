use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::horizon::Horizon;
use thiserror::Error;

/// A required series cache is missing or holds no bars
#[derive(Debug, Clone, Error, PartialEq)]
#[error("No {timeframe} data available for {symbol}")]
pub struct DataUnavailableError {
    pub symbol: String,
    pub timeframe: Timeframe,
}

/// Errors raised while fitting the per-horizon ensembles
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(
        "Insufficient data for {symbol} (Rows: {rows}). Need {required}+. 1H:{rows_1h}, 4H:{rows_4h}, 1D:{rows_1d}"
    )]
    InsufficientData {
        symbol: String,
        rows: usize,
        required: usize,
        rows_1h: usize,
        rows_4h: usize,
        rows_1d: usize,
    },

    #[error(transparent)]
    DataUnavailable(#[from] DataUnavailableError),

    #[error("Failed to persist {horizon} model for {symbol}: {reason}")]
    Persistence {
        symbol: String,
        horizon: Horizon,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Structural failures while reading a serialized ensemble.
///
/// Individual malformed numbers never produce this error; they coerce to 0.0.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Model is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Model is missing required section `{0}`")]
    MissingSection(&'static str),

    #[error("Tree {tree} is missing required array `{field}`")]
    MissingArray { tree: usize, field: &'static str },

    #[error("Tree {tree} array `{field}` has {found} entries, expected {expected}")]
    LengthMismatch {
        tree: usize,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Tree {tree} has no nodes")]
    EmptyTree { tree: usize },
}

/// Errors surfaced by desktop inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    DataUnavailable(#[from] DataUnavailableError),

    #[error("Insufficient data to build features for {symbol}")]
    InsufficientData { symbol: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised while assembling a model package
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Missing {horizon} model for {symbol}")]
    MissingModel { symbol: String, horizon: Horizon },

    #[error("Failed to write package for {symbol}: {reason}")]
    Io { symbol: String, reason: String },
}

/// Bulk export found nothing it could package
#[derive(Debug, Clone, Error, PartialEq)]
#[error("No valid models found to export ({attempted} symbols attempted)")]
pub struct NoValidModelsError {
    pub attempted: usize,
    /// Per-symbol failure messages for the symbols that were attempted
    pub failures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_error_reports_row_counts() {
        let err = TrainingError::InsufficientData {
            symbol: "AAPL".to_string(),
            rows: 12,
            required: 50,
            rows_1h: 40,
            rows_4h: 10,
            rows_1d: 2,
        };

        let msg = err.to_string();
        assert!(msg.contains("Rows: 12"));
        assert!(msg.contains("1H:40"));
        assert!(msg.contains("4H:10"));
        assert!(msg.contains("1D:2"));
    }

    #[test]
    fn test_missing_model_names_horizon() {
        let err = ExportError::MissingModel {
            symbol: "AAPL".to_string(),
            horizon: Horizon::TwoDays,
        };
        assert_eq!(err.to_string(), "Missing 2D model for AAPL");
    }

    #[test]
    fn test_data_unavailable_formatting() {
        let err = DataUnavailableError {
            symbol: "TSLA".to_string(),
            timeframe: Timeframe::OneHour,
        };
        assert_eq!(err.to_string(), "No 1H data available for TSLA");
    }
}
