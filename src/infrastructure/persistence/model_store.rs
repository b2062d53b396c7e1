use crate::domain::ml::horizon::Horizon;
use crate::domain::repositories::ModelRepository;
use crate::infrastructure::persistence::write_atomic;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Trained ensembles as `{model_dir}/{SYMBOL}_{4H|2D|5D}.json`
pub struct JsonModelRepository {
    model_dir: PathBuf,
}

impl JsonModelRepository {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn path_for(&self, symbol: &str, horizon: Horizon) -> PathBuf {
        self.model_dir
            .join(format!("{}_{}.json", symbol, horizon.key()))
    }
}

impl ModelRepository for JsonModelRepository {
    fn load(&self, symbol: &str, horizon: Horizon) -> Result<Option<String>> {
        let path = self.path_for(symbol, horizon);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        Ok(Some(text))
    }

    fn save(&self, symbol: &str, horizon: Horizon, model_json: &str) -> Result<()> {
        let path = self.path_for(symbol, horizon);
        write_atomic(&path, model_json.as_bytes())?;
        info!("Saved {} model for {} to {:?}", horizon, symbol, path);
        Ok(())
    }

    fn delete(&self, symbol: &str) -> Result<usize> {
        let mut removed = 0;
        for horizon in Horizon::ALL {
            let path = self.path_for(symbol, horizon);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn trained_symbols(&self) -> Result<Vec<String>> {
        if !self.model_dir.exists() {
            return Ok(Vec::new());
        }
        let suffix = format!("_{}.json", Horizon::FourHours.key());
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.model_dir)
            .with_context(|| format!("Failed to list {}", self.model_dir.display()))?
        {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(symbol) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_suffix(&suffix))
            {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "horizoncast_models_test_{}_{}",
            std::process::id(),
            n
        ))
    }

    #[test]
    fn test_save_load_overwrite_delete() {
        let dir = temp_dir();
        let repo = JsonModelRepository::new(&dir);

        assert!(repo.load("AAPL", Horizon::FourHours).unwrap().is_none());
        repo.save("AAPL", Horizon::FourHours, "{\"a\":1}").unwrap();
        repo.save("AAPL", Horizon::FourHours, "{\"a\":2}").unwrap();
        repo.save("AAPL", Horizon::TwoDays, "{}").unwrap();

        assert_eq!(
            repo.load("AAPL", Horizon::FourHours).unwrap().as_deref(),
            Some("{\"a\":2}")
        );
        assert!(!dir.join("AAPL_4H.tmp").exists());

        assert_eq!(repo.delete("AAPL").unwrap(), 2);
        assert!(repo.load("AAPL", Horizon::TwoDays).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_trained_symbols_require_four_hour_model() {
        let dir = temp_dir();
        let repo = JsonModelRepository::new(&dir);
        assert!(repo.trained_symbols().unwrap().is_empty());

        repo.save("TSLA", Horizon::FourHours, "{}").unwrap();
        repo.save("AMZN", Horizon::FourHours, "{}").unwrap();
        repo.save("NVDA", Horizon::FiveDays, "{}").unwrap();

        assert_eq!(repo.trained_symbols().unwrap(), vec!["AMZN", "TSLA"]);

        let _ = fs::remove_dir_all(&dir);
    }
}
