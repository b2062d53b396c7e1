pub mod feature_registry;
pub mod horizon;
pub mod manifest;
pub mod signal;
