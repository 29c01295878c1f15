use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PredictorError;
use crate::features::{FEATURE_NAMES, FeatureVector};
use crate::forest::RandomForest;
use crate::labels::Market;

pub const ARTIFACT_VERSION: u32 = 1;

/// A fitted per-market model. Classes are sorted and were observed during fitting.
pub trait Classifier: Send + Sync {
    fn classes(&self) -> &[i32];

    fn predict(&self, features: &FeatureVector) -> i32;

    /// Distribution aligned with `classes()`, or `None` for models that only vote.
    fn predict_proba(&self, _features: &FeatureVector) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub market: Market,
    pub feature_names: Vec<String>,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(market: Market, forest: RandomForest) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            market,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            forest,
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("create model dir {}", dir.display()))?;
        let path = dir.join(self.market.artifact_file_name());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(self).context("serialize model artifact")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    pub fn load(dir: &Path, market: Market) -> Result<Self> {
        let path = dir.join(market.artifact_file_name());
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        artifact.check(market)?;
        Ok(artifact)
    }

    fn check(&self, market: Market) -> std::result::Result<(), PredictorError> {
        if self.version != ARTIFACT_VERSION {
            return Err(PredictorError::ModelFormat(format!(
                "{market}: artifact version {} (expected {ARTIFACT_VERSION})",
                self.version
            )));
        }
        if self.market != market {
            return Err(PredictorError::ModelFormat(format!(
                "{market}: artifact was trained for {}",
                self.market
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(PredictorError::ModelFormat(format!(
                "{market}: feature layout {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.forest.n_features() != FEATURE_NAMES.len() {
            return Err(PredictorError::ModelFormat(format!(
                "{market}: forest expects {} features",
                self.forest.n_features()
            )));
        }
        self.forest.validate()
    }
}

/// Load-once, read-only set of per-market models shared by every request.
pub struct ModelRegistry {
    models: Vec<(Market, Box<dyn Classifier>)>,
}

impl ModelRegistry {
    pub fn load(dir: &Path) -> Result<Self> {
        let mut models: Vec<(Market, Box<dyn Classifier>)> = Vec::with_capacity(Market::ALL.len());
        for market in Market::ALL {
            let artifact = ModelArtifact::load(dir, market)?;
            info!(
                market = %market,
                trees = artifact.forest.n_trees(),
                classes = ?artifact.forest.classes(),
                "model loaded"
            );
            let model: Box<dyn Classifier> = Box::new(artifact.forest);
            models.push((market, model));
        }
        Ok(Self { models })
    }

    /// Markets keep the order given; duplicates keep the first model.
    pub fn from_models(models: Vec<(Market, Box<dyn Classifier>)>) -> Self {
        let mut out: Vec<(Market, Box<dyn Classifier>)> = Vec::with_capacity(models.len());
        for (market, model) in models {
            if out.iter().any(|(m, _)| *m == market) {
                continue;
            }
            out.push((market, model));
        }
        Self { models: out }
    }

    pub fn get(&self, market: Market) -> Option<&dyn Classifier> {
        self.models
            .iter()
            .find(|(m, _)| *m == market)
            .map(|(_, model)| model.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Market, &dyn Classifier)> + '_ {
        self.models.iter().map(|(m, model)| (*m, model.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.models.iter().map(|(m, _)| m))
            .finish()
    }
}
