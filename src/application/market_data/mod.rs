// Market data processing modules
pub mod statistical_features;
pub mod timeframe_aggregator;
