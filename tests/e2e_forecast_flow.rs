use horizoncast::application::feature_engineering_service::latest_feature_map;
use horizoncast::application::forecast_engine::ForecastEngine;
use horizoncast::application::ml::model_inference::{ModelInference, ModelStatus};
use horizoncast::application::ml::trainer::BoosterParams;
use horizoncast::domain::errors::{InferenceError, TrainingError};
use horizoncast::domain::market::timeframe::Timeframe;
use horizoncast::domain::ml::horizon::Horizon;
use horizoncast::domain::repositories::{ModelRepository, SeriesRepository};
use horizoncast::infrastructure::mock::SyntheticSeriesGenerator;
use horizoncast::infrastructure::persistence::{
    CsvSeriesRepository, JsonModelRepository, PackageStore,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

struct Workspace {
    root: PathBuf,
    series: Arc<CsvSeriesRepository>,
    models: Arc<JsonModelRepository>,
    engine: ForecastEngine,
}

impl Workspace {
    fn new() -> Self {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!(
            "horizoncast_e2e_{}_{}",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_dir_all(&root);

        let series = Arc::new(CsvSeriesRepository::new(root.join("data")));
        let models = Arc::new(JsonModelRepository::new(root.join("models")));
        let engine = ForecastEngine::new(
            series.clone(),
            models.clone(),
            PackageStore::new(root.join("models")),
        )
        .with_params(BoosterParams {
            n_estimators: 10,
            ..BoosterParams::default()
        });

        Self {
            root,
            series,
            models,
            engine,
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[test]
fn test_e2e_train_infer_export() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let ws = Workspace::new();
    for series in SyntheticSeriesGenerator::new(7).series_set("AAPL", 500) {
        ws.series.save(&series)?;
    }

    // 1. Train: one stored ensemble per horizon
    let summary = ws.engine.train_symbol("AAPL")?;
    assert_eq!(summary.rows_1h, 500);
    assert_eq!(summary.horizons.len(), 3);
    for horizon in Horizon::ALL {
        assert!(ws.models.path_for("AAPL", horizon).exists());
        assert!(ws.models.load("AAPL", horizon)?.is_some());
    }
    let five_day = summary
        .horizons
        .iter()
        .find(|r| r.horizon == Horizon::FiveDays)
        .map(|r| r.rows);
    assert_eq!(five_day, Some(500 - 35));
    assert_eq!(ws.engine.trained_symbols()?, vec!["AAPL"]);

    // 2. Desktop inference on the latest bar
    let result = ws.engine.run_inference("AAPL")?;
    assert_eq!(result.probabilities.len(), 3);
    for p in result.probabilities.values() {
        assert!((0.0..=1.0).contains(p));
    }
    let last_bar = ws
        .series
        .load("AAPL", Timeframe::OneHour)?
        .and_then(|s| s.last().copied());
    assert_eq!(last_bar.map(|b| b.timestamp), Some(result.as_of));

    // 3. The exported package scores the same inputs identically
    let pkg = ws.engine.export_package("AAPL")?;
    assert!(pkg.ends_with("AAPL_mobile_pkg"));

    let mut inference = ModelInference::new(ws.root.join("models"))?;
    let loaded = inference.load_models("AAPL");
    assert!(loaded.values().all(|ok| *ok));
    assert!(inference.has_models("AAPL"));
    assert!(
        inference
            .model_status("AAPL")
            .values()
            .all(|s| *s == ModelStatus::Loaded)
    );

    let features: HashMap<String, f64> = result
        .features
        .named()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    assert_eq!(inference.predict("AAPL", &features), result.as_percentages());

    // 4. The on-device snapshot path produces usable percentages too
    let series_1h = ws.series.load("AAPL", Timeframe::OneHour)?;
    let snapshot = series_1h.as_ref().map(latest_feature_map).unwrap_or_default();
    for pct in inference.predict("AAPL", &snapshot).values() {
        assert!((0.0..=100.0).contains(pct));
    }

    Ok(())
}

#[test]
fn test_e2e_missing_cache_is_reported() {
    let ws = Workspace::new();

    match ws.engine.train_symbol("NOPE") {
        Err(TrainingError::DataUnavailable(e)) => {
            assert_eq!(e.symbol, "NOPE");
            assert_eq!(e.timeframe, Timeframe::OneHour);
        }
        other => panic!("expected DataUnavailable, got {:?}", other.map(|s| s.symbol)),
    }

    match ws.engine.run_inference("NOPE") {
        Err(InferenceError::DataUnavailable(e)) => {
            assert_eq!(e.to_string(), "No 1H data available for NOPE")
        }
        other => panic!("expected DataUnavailable, got {:?}", other.map(|r| r.symbol)),
    }
}

#[test]
fn test_e2e_short_history_writes_nothing() -> anyhow::Result<()> {
    let ws = Workspace::new();
    for series in SyntheticSeriesGenerator::new(3).series_set("TINY", 70) {
        ws.series.save(&series)?;
    }

    let err = ws.engine.train_symbol("TINY").err();
    assert!(matches!(err, Some(TrainingError::InsufficientData { .. })));
    for horizon in Horizon::ALL {
        assert!(ws.models.load("TINY", horizon)?.is_none());
    }
    assert!(ws.engine.trained_symbols()?.is_empty());
    Ok(())
}

#[test]
fn test_e2e_delete_retires_models_and_package() -> anyhow::Result<()> {
    let ws = Workspace::new();
    for series in SyntheticSeriesGenerator::new(5).series_set("MSFT", 300) {
        ws.series.save(&series)?;
    }
    ws.engine.train_symbol("MSFT")?;
    let pkg = ws.engine.export_package("MSFT")?;
    assert!(pkg.exists());

    assert_eq!(ws.engine.delete_package("MSFT")?, 3);
    assert!(!pkg.exists());
    assert!(ws.engine.trained_symbols()?.is_empty());

    // Without models, inference degrades to zeros instead of failing
    let result = ws.engine.run_inference("MSFT")?;
    assert!(result.probabilities.values().all(|p| *p == 0.0));
    Ok(())
}
