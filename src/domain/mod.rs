// Bars, series and timeframes
pub mod market;

// Feature registry, horizons, package manifest, signal classification
pub mod ml;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
