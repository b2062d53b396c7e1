//! Batch training settings parsed from environment variables.

use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingEnvConfig {
    /// Symbols the batch trainer and bulk commands default to. Empty means
    /// every symbol with a cached 1H series.
    pub symbols: Vec<String>,
    /// Worker threads for batch training, 0 lets rayon decide
    pub workers: usize,
    /// Seed for the synthetic series generator
    pub synthetic_seed: u64,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            workers: 0,
            synthetic_seed: 42,
        }
    }
}

impl TrainingEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            symbols: env::var("SYMBOLS")
                .map(|v| parse_symbols(&v))
                .unwrap_or(defaults.symbols),
            workers: env::var("TRAIN_WORKERS")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(defaults.workers),
            synthetic_seed: env::var("SYNTHETIC_SEED")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(defaults.synthetic_seed),
        }
    }
}

/// Comma separated, trimmed, upper-cased, blanks dropped
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
