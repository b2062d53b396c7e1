use crate::domain::ml::signal::SignalThresholds;
use crate::infrastructure::persistence::write_atomic;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Bars requested per refresh
    pub n_bars: u32,
    /// Minutes a fetched snapshot stays fresh
    pub validity_minutes: u32,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            n_bars: 50,
            validity_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    pub thresholds: SignalThresholds,
    pub data: DataSettings,
}

/// Overlays `patch` onto `base`, recursing into objects present on both sides
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub struct SettingsPersistence {
    file_path: PathBuf,
}

impl SettingsPersistence {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Loads settings, filling anything the file omits from the defaults.
    ///
    /// A missing file yields the defaults. An unreadable or invalid file is
    /// logged and also yields the defaults.
    pub fn load(&self) -> AppSettings {
        if !self.file_path.exists() {
            return AppSettings::default();
        }
        match self.try_load() {
            Ok(settings) => {
                info!("Loaded settings from {:?}", self.file_path);
                settings
            }
            Err(e) => {
                warn!("Failed to load settings from {:?}: {:#}", self.file_path, e);
                AppSettings::default()
            }
        }
    }

    fn try_load(&self) -> Result<AppSettings> {
        let content =
            fs::read_to_string(&self.file_path).context("Failed to read settings file")?;
        let saved: Value =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        let mut merged =
            serde_json::to_value(AppSettings::default()).context("Failed to encode defaults")?;
        merge(&mut merged, saved);
        serde_json::from_value(merged).context("Settings file has invalid values")
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        write_atomic(&self.file_path, content.as_bytes()).context("Failed to write settings file")?;

        info!("Saved settings to {:?}", self.file_path);
        Ok(())
    }

    /// Sets one threshold by its persisted key (`COMBO_4H`, `AVOID`, ...) and saves
    pub fn update_threshold(&self, key: &str, value: f64) -> Result<AppSettings> {
        let mut settings = self.load();
        let t = &mut settings.thresholds;
        match key.to_uppercase().as_str() {
            "COMBO_4H" => t.combo_4h = value,
            "COMBO_5D" => t.combo_5d = value,
            "SCALP_4H" => t.scalp_4h = value,
            "WATCH_5D" => t.watch_5d = value,
            "AVOID" => t.avoid = value,
            other => bail!(
                "Unknown threshold '{}'. Valid keys: COMBO_4H, COMBO_5D, SCALP_4H, WATCH_5D, AVOID",
                other
            ),
        }
        self.save(&settings)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_file() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "horizoncast_settings_test_{}_{}.json",
            std::process::id(),
            n
        ))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let store = SettingsPersistence::new(temp_file());
        assert_eq!(store.load(), AppSettings::default());
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let path = temp_file();
        fs::write(&path, r#"{"thresholds": {"COMBO_4H": 80.0}, "extra": true}"#).unwrap();

        let settings = SettingsPersistence::new(&path).load();
        assert_eq!(settings.thresholds.combo_4h, 80.0);
        assert_eq!(settings.thresholds.avoid, 40.0);
        assert_eq!(settings.data.n_bars, 50);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let path = temp_file();
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(SettingsPersistence::new(&path).load(), AppSettings::default());

        fs::write(&path, r#"{"data": {"n_bars": "many"}}"#).unwrap();
        assert_eq!(SettingsPersistence::new(&path).load(), AppSettings::default());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_update_threshold_persists() {
        let path = temp_file();
        let store = SettingsPersistence::new(&path);

        let updated = store.update_threshold("scalp_4h", 65.0).unwrap();
        assert_eq!(updated.thresholds.scalp_4h, 65.0);
        assert_eq!(store.load().thresholds.scalp_4h, 65.0);
        assert!(!path.with_extension("tmp").exists());

        assert!(store.update_threshold("BOGUS", 1.0).is_err());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_creates_directory_and_replaces_file() {
        let dir = temp_file().with_extension("d");
        let path = dir.join("nested").join("config.json");
        let store = SettingsPersistence::new(&path);

        store.save(&AppSettings::default()).unwrap();
        let mut changed = AppSettings::default();
        changed.data.n_bars = 120;
        store.save(&changed).unwrap();

        assert_eq!(store.load(), changed);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("config.json")]);

        let _ = fs::remove_dir_all(&dir);
    }
}
