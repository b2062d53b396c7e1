//! Configuration module for HorizonCast.
//!
//! Runtime settings come from environment variables (after `.env` is loaded
//! by the binaries), grouped by concern: storage locations and batch
//! training. Window sizes, horizon definitions and booster parameters are
//! constants in their modules.

mod storage_config;
mod training_config;

pub use storage_config::StorageEnvConfig;
pub use training_config::{TrainingEnvConfig, parse_symbols};

use anyhow::Result;
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub storage: StorageEnvConfig,
    pub training: TrainingEnvConfig,
}

impl Config {
    /// Loads configuration from environment variables. Unset or
    /// unparseable values fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            storage: StorageEnvConfig::from_env(),
            training: TrainingEnvConfig::from_env(),
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone()
    }

    pub fn model_dir(&self) -> PathBuf {
        self.storage.model_dir.clone()
    }
}
