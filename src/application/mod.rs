// Market data processing (rolling statistics, resampling)
pub mod market_data;

// Feature builder, multi-timeframe aligner, on-device snapshot
pub mod feature_engineering_service;

// Labels, trainer, tree evaluator, package inference
pub mod ml;

// Train / infer / export orchestration
pub mod forecast_engine;

// Background worker fed over channels
pub mod client;
