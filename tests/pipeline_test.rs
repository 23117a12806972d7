// tests/pipeline_test.rs: Integration test: record → encode → project → predict

use std::path::Path;
use std::sync::Arc;
use std::thread;

use carprice_inference::schema::{CATEGORICAL_COLUMNS, FEATURE_COLUMNS};
use carprice_inference::{Config, PipelineError, PricePipeline, Record, Stage};
use serde_json::{json, Value};

fn encoder_artifact() -> Value {
    let mut mapping = serde_json::Map::new();
    let known: [(&str, &[(&str, f64, u64)]); 10] = [
        ("Manufacturer", &[("TOYOTA", 30_000_000.0, 2000), ("HONDA", 20_000_000.0, 1500)]),
        ("Model", &[("Corolla", 1_200_000.0, 100), ("Civic", 1_500_000.0, 110)]),
        ("Category", &[("Sedan", 80_000_000.0, 5000)]),
        ("Leather interior", &[("Yes", 150_000_000.0, 7000), ("No", 40_000_000.0, 3000)]),
        ("Fuel type", &[("Petrol", 90_000_000.0, 6000)]),
        ("Gear box type", &[("Automatic", 100_000_000.0, 6500)]),
        ("Drive wheels", &[("Front", 95_000_000.0, 7000)]),
        (
            "Doors",
            &[
                ("02-Mar", 6_000_000.0, 400),
                ("04-May", 170_000_000.0, 9000),
                (">5", 2_000_000.0, 100),
            ],
        ),
        ("Wheel", &[("Left wheel", 180_000_000.0, 9000)]),
        ("Color", &[("White", 40_000_000.0, 2200), ("Black", 45_000_000.0, 2400)]),
    ];
    for (column, categories) in known {
        let stats: serde_json::Map<String, Value> = categories
            .iter()
            .map(|(name, sum, count)| (name.to_string(), json!({ "sum": sum, "count": count })))
            .collect();
        mapping.insert(column.to_string(), Value::Object(stats));
    }

    json!({
        "kind": "leave_one_out",
        "columns": CATEGORICAL_COLUMNS,
        "global_mean": 18555.5,
        "handle_unknown": "value",
        "mapping": mapping,
    })
}

fn model_artifact() -> Value {
    json!({
        "kind": "linear",
        "feature_names": FEATURE_COLUMNS,
        "coefficients": [
            -0.8, 0.35, 0.6, 310.0, 0.25, 0.15, 0.1,
            1500.0, -0.02, 0.2, 0.05, 0.12, -40.0
        ],
        "intercept": -620000.0
    })
}

fn corolla() -> Value {
    json!({
        "Levy": 0,
        "Manufacturer": "TOYOTA",
        "Model": "Corolla",
        "Prod. year": 2015,
        "Category": "Sedan",
        "Leather interior": "Yes",
        "Fuel type": "Petrol",
        "Engine volume": 1.6,
        "Mileage": 80000,
        "Cylinders": 4,
        "Gear box type": "Automatic",
        "Drive wheels": "Front",
        "Doors": "4",
        "Wheel": "Left wheel",
        "Color": "White",
        "Airbags": 6
    })
}

/// Write both artifacts and a config file into `dir`; return the config path.
fn setup(dir: &Path) -> std::path::PathBuf {
    std::fs::write(
        dir.join("loo_encoder.json"),
        serde_json::to_vec_pretty(&encoder_artifact()).unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join("price_model.json"),
        serde_json::to_vec_pretty(&model_artifact()).unwrap(),
    )
    .unwrap();

    let config_path = dir.join("carprice.toml");
    std::fs::write(
        &config_path,
        format!(
            concat!(
                "[artifacts]\n",
                "base_dir = {:?}\n",
                "model_file = \"price_model.json\"\n",
                "retry_backoff_ms = 0\n",
            ),
            dir.display().to_string()
        ),
    )
    .unwrap();
    config_path
}

fn pipeline(dir: &Path) -> PricePipeline {
    let config = Config::load_from(&setup(dir)).unwrap();
    PricePipeline::new(config)
}

#[test]
fn test_corolla_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let prediction = pipeline.run_json(&corolla()).unwrap();
    assert!(prediction.price.is_finite());

    // Hand-computed from the artifacts above
    let features = [
        0.0,
        30_000_000.0 / 2000.0,
        1_200_000.0 / 100.0,
        2015.0,
        80_000_000.0 / 5000.0,
        150_000_000.0 / 7000.0,
        90_000_000.0 / 6000.0,
        1.6,
        80000.0,
        100_000_000.0 / 6500.0,
        180_000_000.0 / 9000.0,
        40_000_000.0 / 2200.0,
        6.0,
    ];
    let weights = model_artifact()["coefficients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w.as_f64().unwrap())
        .collect::<Vec<_>>();
    let expected = features
        .iter()
        .zip(&weights)
        .fold(-620000.0, |acc, (x, w)| acc + x * w);

    assert!((prediction.price - expected).abs() < 1e-6);
    assert_eq!(prediction.to_string(), format!("${:.2}", expected));
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let prices: Vec<u64> = (0..5)
        .map(|_| pipeline.run_json(&corolla()).unwrap().price.to_bits())
        .collect();
    assert!(prices.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(pipeline.encoder_loads(), 1);
    assert_eq!(pipeline.model_loads(), 1);
}

#[test]
fn test_missing_color_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let mut record = corolla();
    record.as_object_mut().unwrap().remove("Color");

    let err = pipeline.run_json(&record).unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    assert_eq!(err.stage(), Stage::Validation);
    assert_eq!(pipeline.model_loads(), 0);
}

#[test]
fn test_missing_model_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = setup(dir.path());
    std::fs::remove_file(dir.path().join("price_model.json")).unwrap();

    let pipeline = PricePipeline::new(Config::load_from(&config_path).unwrap());
    let record: Record = Record::from_json(&corolla()).unwrap();

    let first = pipeline.run(&record).unwrap_err();
    let second = pipeline.run(&record).unwrap_err();
    assert!(matches!(first, PipelineError::ArtifactNotFound { .. }));
    assert!(matches!(second, PipelineError::ArtifactNotFound { .. }));
    assert_eq!(pipeline.encoder_loads(), 1);
}

#[test]
fn test_missing_encoder_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = setup(dir.path());
    std::fs::remove_file(dir.path().join("loo_encoder.json")).unwrap();

    let pipeline = PricePipeline::new(Config::load_from(&config_path).unwrap());
    let err = pipeline.run_json(&corolla()).unwrap_err();
    match err {
        PipelineError::ArtifactNotFound { kind, path } => {
            assert_eq!(kind.to_string(), "encoder");
            assert!(path.ends_with("loo_encoder.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_doors_variants_all_predict() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let mut prices = Vec::new();
    for doors in ["2", "4", ">5"] {
        let mut record = corolla();
        record["Doors"] = json!(doors);
        prices.push(pipeline.run_json(&record).unwrap().price);
    }
    // Doors is encoded but dropped before inference
    assert!(prices.iter().all(|p| (p - prices[0]).abs() < 1e-9));

    let mut record = corolla();
    record["Doors"] = json!("3");
    let err = pipeline.run_json(&record).unwrap_err();
    assert_eq!(err.stage(), Stage::Validation);
}

#[test]
fn test_concurrent_first_calls_load_once() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(pipeline(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.run_json(&corolla()).unwrap().price)
        })
        .collect();

    let prices: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(prices.iter().all(|p| p.to_bits() == prices[0].to_bits()));
    assert_eq!(pipeline.encoder_loads(), 1);
    assert_eq!(pipeline.model_loads(), 1);
}

#[test]
fn test_strict_column_order_accepts_training_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::load_from(&setup(dir.path())).unwrap();
    config.validation.strict_column_order = true;
    config.validation.strict_categories = true;

    let pipeline = PricePipeline::new(config);
    assert!(pipeline.run_json(&corolla()).is_ok());

    let mut record = corolla();
    record["Model"] = json!("Camry");
    let err = pipeline.run_json(&record).unwrap_err();
    assert!(matches!(err, PipelineError::UnseenCategory { .. }));
}
