pub mod model_store;
pub mod package_store;
pub mod series_store;

pub use model_store::JsonModelRepository;
pub use package_store::PackageStore;
pub use series_store::CsvSeriesRepository;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Writes `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;
    Ok(())
}
