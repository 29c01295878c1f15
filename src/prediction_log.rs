use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::error::{PredictorError, Result};
use crate::labels::Market;
use crate::predict::{MarketPrediction, MatchInput};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TEAM_COLUMNS: [&str; 2] = ["home_team", "away_team"];

#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRow {
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

/// Append-only CSV of prediction events.
///
/// Every handle on the same path shares one lock, so the header check and the row
/// append happen as a unit across the process.
#[derive(Debug, Clone)]
pub struct PredictionLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = path_lock(&path);
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, features: &Value, predictions: &Value) -> Result<LoggedRow> {
        let features = as_mapping(features, "features")?;
        let predictions = as_mapping(predictions, "predictions")?;
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let row = build_row(&timestamp, features, predictions);

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(&row.columns)?;
        }
        writer.write_record(&row.values)?;
        writer.flush()?;
        Ok(row)
    }

    pub fn append_prediction(&self, input: &MatchInput, predictions: &[MarketPrediction]) -> Result<LoggedRow> {
        let mut features = Map::new();
        for (name, value) in input.features.named() {
            features.insert(name.to_string(), Value::from(value));
        }
        features.insert("home_team".to_string(), Value::from(input.home_team.clone()));
        features.insert("away_team".to_string(), Value::from(input.away_team.clone()));

        let mut preds = Map::new();
        for p in predictions {
            preds.insert(p.market.column().to_string(), Value::from(p.label.to_string()));
        }

        self.append(&Value::Object(features), &Value::Object(preds))
    }
}

static PATH_LOCKS: OnceCell<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceCell::new();

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    // Absolute form so "log.csv" and "./log.csv" share a lock.
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = PATH_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

fn as_mapping<'a>(value: &'a Value, what: &'static str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or(PredictorError::InvalidRecord {
        what,
        kind: json_kind(value),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// timestamp, teams, feature columns, markets in fixed order, then anything left over.
fn build_row(timestamp: &str, features: &Map<String, Value>, predictions: &Map<String, Value>) -> LoggedRow {
    let mut record = Map::new();
    record.insert("timestamp".to_string(), Value::from(timestamp));
    for (k, v) in features.iter().chain(predictions.iter()) {
        record.insert(k.clone(), v.clone());
    }

    let mut columns: Vec<String> = vec!["timestamp".to_string()];
    columns.extend(TEAM_COLUMNS.iter().map(|c| c.to_string()));
    for key in features.keys() {
        if !TEAM_COLUMNS.contains(&key.as_str()) && !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    for market in Market::ALL {
        let key = market.column();
        if predictions.contains_key(key) && !columns.iter().any(|c| c == key) {
            columns.push(key.to_string());
        }
    }
    for key in record.keys() {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }

    let values = columns
        .iter()
        .map(|c| record.get(c).map(cell_text).unwrap_or_default())
        .collect();
    LoggedRow { columns, values }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn columns_follow_fixed_order() {
        let features = json!({
            "HOME_FORM": 7.0,
            "home_team": "Arsenal",
            "AWAY_FORM": 6.0,
            "away_team": "Chelsea",
        });
        let predictions = json!({
            "BTTS": "No BTTS",
            "HDA": "Home Win",
            "confidence": "high",
        });
        let row = build_row(
            "2026-01-01 10:00:00",
            features.as_object().unwrap(),
            predictions.as_object().unwrap(),
        );
        assert_eq!(
            row.columns,
            vec![
                "timestamp",
                "home_team",
                "away_team",
                "HOME_FORM",
                "AWAY_FORM",
                "HDA",
                "BTTS",
                "confidence"
            ]
        );
        assert_eq!(row.values[1], "Arsenal");
        assert_eq!(row.values[3], "7.0");
        assert_eq!(row.values[5], "Home Win");
    }

    #[test]
    fn handles_on_one_path_share_a_lock() {
        let path = std::env::temp_dir().join("shared_lock_check.csv");
        let a = PredictionLog::new(&path);
        let b = PredictionLog::new(path.clone());
        let other = PredictionLog::new(std::env::temp_dir().join("other_lock_check.csv"));
        assert!(Arc::ptr_eq(&a.lock, &b.lock));
        assert!(!Arc::ptr_eq(&a.lock, &other.lock));
    }

    #[test]
    fn non_mapping_input_is_rejected() {
        let log = PredictionLog::new(std::env::temp_dir().join("never_written.csv"));
        let err = log.append(&json!([1, 2]), &json!({})).unwrap_err();
        assert!(matches!(
            err,
            PredictorError::InvalidRecord {
                what: "features",
                kind: "array"
            }
        ));
        let err = log.append(&json!({}), &json!("HDA")).unwrap_err();
        assert!(matches!(err, PredictorError::InvalidRecord { what: "predictions", .. }));
    }
}
