use crate::domain::ml::horizon::Horizon;
use crate::domain::ml::manifest::{MANIFEST_FILE_NAME, PackageManifest};
use crate::infrastructure::persistence::write_atomic;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the bulk export directory under the model directory
pub const EXPORT_DIR_NAME: &str = "mobile_exports";

fn file_safe(symbol: &str) -> String {
    symbol.replace('.', "_")
}

/// Writes model packages under the model directory.
///
/// Layout:
/// - `{model_dir}/{SYMBOL}_mobile_pkg/` one package per symbol
/// - `{model_dir}/mobile_exports/{SYMBOL}_pkg/` copies made by bulk export
pub struct PackageStore {
    model_dir: PathBuf,
}

impl PackageStore {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn package_dir(&self, symbol: &str) -> PathBuf {
        self.model_dir
            .join(format!("{}_mobile_pkg", file_safe(symbol)))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.model_dir.join(EXPORT_DIR_NAME)
    }

    /// Writes the horizon files and the manifest. Existing files are replaced
    /// one by one (last writer wins).
    pub fn write_package(
        &self,
        symbol: &str,
        models: &[(Horizon, String)],
        manifest: &PackageManifest,
    ) -> Result<PathBuf> {
        let dir = self.package_dir(symbol);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create package directory {}", dir.display()))?;

        for (horizon, json) in models {
            write_atomic(&dir.join(horizon.package_file_name()), json.as_bytes())?;
        }

        let manifest_json =
            serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
        write_atomic(&dir.join(MANIFEST_FILE_NAME), manifest_json.as_bytes())?;

        info!("Exported package for {} to {:?}", symbol, dir);
        Ok(dir)
    }

    /// Empties (or creates) the bulk export directory
    pub fn reset_export_dir(&self) -> Result<PathBuf> {
        let dir = self.export_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    /// Copies a written package into the bulk export directory as `{SYMBOL}_pkg`
    pub fn copy_to_export(&self, symbol: &str, package_dir: &Path) -> Result<PathBuf> {
        let dest = self.export_dir().join(format!("{}_pkg", file_safe(symbol)));
        copy_flat_dir(package_dir, &dest)?;
        Ok(dest)
    }

    /// Removes the symbol's package directory. Returns whether one existed.
    pub fn delete_package(&self, symbol: &str) -> Result<bool> {
        let dir = self.package_dir(symbol);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("Failed to delete {}", dir.display()))?;
        info!("Deleted package for {} at {:?}", symbol, dir);
        Ok(true)
    }
}

fn copy_flat_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("Failed to list {}", src.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            fs::copy(&path, dest.join(entry.file_name()))
                .with_context(|| format!("Failed to copy {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "horizoncast_packages_test_{}_{}",
            std::process::id(),
            n
        ))
    }

    #[test]
    fn test_write_copy_delete() {
        let root = temp_dir();
        let store = PackageStore::new(&root);
        let models: Vec<(Horizon, String)> = Horizon::ALL
            .iter()
            .map(|h| (*h, format!("{{\"h\":\"{}\"}}", h)))
            .collect();

        let pkg = store
            .write_package("BRK.B", &models, &PackageManifest::for_symbol("BRK.B"))
            .unwrap();
        assert_eq!(pkg, root.join("BRK_B_mobile_pkg"));
        assert!(pkg.join("model_2D.json").exists());

        let text = fs::read_to_string(pkg.join(MANIFEST_FILE_NAME)).unwrap();
        let manifest: PackageManifest = serde_json::from_str(&text).unwrap();
        assert_eq!(manifest.symbol, "BRK.B");

        store.reset_export_dir().unwrap();
        let copied = store.copy_to_export("BRK.B", &pkg).unwrap();
        assert_eq!(copied, root.join(EXPORT_DIR_NAME).join("BRK_B_pkg"));
        assert_eq!(fs::read_dir(&copied).unwrap().count(), 4);

        // reset wipes earlier exports
        store.reset_export_dir().unwrap();
        assert!(!copied.exists());

        assert!(store.delete_package("BRK.B").unwrap());
        assert!(!store.delete_package("BRK.B").unwrap());

        let _ = fs::remove_dir_all(&root);
    }
}
