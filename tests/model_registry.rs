use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use epl_predictor::classifier::{Classifier, ModelArtifact, ModelRegistry};
use epl_predictor::dataset::{assemble_training_table, train_test_split};
use epl_predictor::forest::{ForestConfig, RandomForest};
use epl_predictor::labels::Market;
use epl_predictor::match_data::Match;
use epl_predictor::predict::{MarketProbabilities, market_probabilities};
use serde_json::Value;

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("epl_predictor_{tag}_{}_{nanos}", std::process::id()))
}

fn results() -> Vec<Match> {
    let teams = ["ARS", "CHE", "LIV", "MCI", "TOT", "NEW"];
    (0..90)
        .map(|i| {
            let home = teams[i % teams.len()];
            let away = teams[(i * 5 + 1) % teams.len()];
            let away = if away == home { teams[(i + 3) % teams.len()] } else { away };
            Match::new(home, away, ((i * 7) % 5) as u8, ((i * 3) % 4) as u8)
        })
        .collect()
}

fn small_forest() -> ForestConfig {
    ForestConfig {
        n_trees: 15,
        ..ForestConfig::default()
    }
}

#[test]
fn trained_models_round_trip_through_disk() {
    let dir = scratch_dir("roundtrip");
    let table = assemble_training_table(&results());
    let split = train_test_split(&table, 0.2, 42);

    let mut fitted = Vec::new();
    for market in Market::ALL {
        let (x, y) = split.train_xy(market);
        let forest = RandomForest::fit(&x, &y, small_forest()).unwrap();
        ModelArtifact::new(market, forest.clone()).save(&dir).unwrap();
        fitted.push(forest);
    }

    let registry = ModelRegistry::load(&dir).unwrap();
    assert_eq!(registry.len(), 4);
    let sample = table[10].features;
    for (market, before) in Market::ALL.into_iter().zip(&fitted) {
        let loaded = registry.get(market).unwrap();
        assert_eq!(loaded.classes(), before.classes());
        assert_eq!(loaded.predict(&sample), before.predict(&sample));
        let got = loaded.predict_proba(&sample).unwrap();
        let want = before.predict_proba(&sample).unwrap();
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() < 1e-12);
        }
    }

    for dist in market_probabilities(&registry, &sample) {
        let MarketProbabilities::Distribution { classes, .. } = dist else {
            panic!("forests always report probabilities");
        };
        let total: f64 = classes.iter().map(|c| c.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn artifact_for_wrong_market_is_rejected() {
    let dir = scratch_dir("mismatch");
    let table = assemble_training_table(&results());
    let rows: Vec<_> = table.iter().collect();
    let (x, y) = epl_predictor::dataset::design_matrix(&rows, Market::Btts);
    let forest = RandomForest::fit(&x, &y, small_forest()).unwrap();

    ModelArtifact::new(Market::Btts, forest).save(&dir).unwrap();
    std::fs::rename(
        dir.join(Market::Btts.artifact_file_name()),
        dir.join(Market::Hda.artifact_file_name()),
    )
    .unwrap();

    let err = ModelArtifact::load(&dir, Market::Hda).unwrap_err();
    assert!(err.to_string().contains("trained for BTTS"), "{err:#}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_artifact_fails_registry_load() {
    let dir = scratch_dir("missing");
    assert!(ModelRegistry::load(&dir).is_err());
}

#[test]
fn artifact_with_empty_tree_is_rejected() {
    let dir = scratch_dir("empty_tree");
    let table = assemble_training_table(&results());
    let rows: Vec<_> = table.iter().collect();
    let (x, y) = epl_predictor::dataset::design_matrix(&rows, Market::Hda);
    let forest = RandomForest::fit(&x, &y, small_forest()).unwrap();
    ModelArtifact::new(Market::Hda, forest).save(&dir).unwrap();

    let path = dir.join(Market::Hda.artifact_file_name());
    let mut json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    json["forest"]["trees"][0]["nodes"] = Value::Array(Vec::new());
    std::fs::write(&path, json.to_string()).unwrap();

    let err = ModelArtifact::load(&dir, Market::Hda).unwrap_err();
    assert!(err.to_string().contains("tree has no nodes"), "{err:#}");
    let _ = std::fs::remove_dir_all(&dir);
}
