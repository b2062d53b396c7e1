pub mod bar;
pub mod timeframe;
