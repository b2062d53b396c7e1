pub mod mock;
pub mod persistence;
pub mod repositories;
pub mod settings_persistence;

pub use persistence::{CsvSeriesRepository, JsonModelRepository, PackageStore};
pub use repositories::{InMemoryModelRepository, InMemorySeriesRepository};
