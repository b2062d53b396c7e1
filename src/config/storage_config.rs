//! Storage locations parsed from environment variables.

use std::env;
use std::path::PathBuf;

/// Where caches, models, packages and settings live on disk
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEnvConfig {
    /// Series CSV cache
    pub data_dir: PathBuf,
    /// Trained per-horizon ensembles and desktop packages
    pub model_dir: PathBuf,
    /// Packages as installed on the client
    pub mobile_models_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("stock_data_cache"),
            model_dir: PathBuf::from("trained_models"),
            mobile_models_dir: PathBuf::from("assets/models"),
            settings_path: PathBuf::from("config.json"),
        }
    }
}

fn path_var(key: &str, default: PathBuf) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

impl StorageEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: path_var("DATA_DIR", defaults.data_dir),
            model_dir: path_var("MODEL_DIR", defaults.model_dir),
            mobile_models_dir: path_var("MOBILE_MODELS_DIR", defaults.mobile_models_dir),
            settings_path: path_var("SETTINGS_PATH", defaults.settings_path),
        }
    }
}
