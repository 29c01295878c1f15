use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::classifier::{Classifier, ModelRegistry};
use crate::error::{PredictorError, Result};
use crate::features::FeatureVector;
use crate::labels::Market;

pub const FORM_RANGE: (f64, f64) = (0.0, 15.0);
pub const AVG_GOALS_RANGE: (f64, f64) = (0.0, 5.0);

/// Fixed class -> display text table for one market.
#[derive(Debug, Clone, Copy)]
pub struct LabelMap {
    entries: &'static [(i32, &'static str)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DisplayLabel {
    Mapped(&'static str),
    Raw(i32),
}

impl fmt::Display for DisplayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayLabel::Mapped(text) => f.write_str(text),
            DisplayLabel::Raw(class) => write!(f, "{class}"),
        }
    }
}

impl LabelMap {
    pub fn for_market(market: Market) -> Self {
        let entries: &'static [(i32, &'static str)] = match market {
            Market::Hda => &[(1, "Home Win"), (0, "Draw"), (-1, "Away Win")],
            Market::Over25 => &[(1, "Over 2.5 Goals"), (0, "Under 2.5 Goals")],
            Market::Btts => &[(1, "Both Teams to Score"), (0, "No BTTS")],
            Market::DoubleChance => &[(1, "Home or Draw"), (0, "Away Win Only")],
        };
        Self { entries }
    }

    pub fn lookup(&self, class: i32) -> DisplayLabel {
        match self.entries.iter().find(|(c, _)| *c == class) {
            Some((_, text)) => DisplayLabel::Mapped(text),
            None => DisplayLabel::Raw(class),
        }
    }
}

/// A hypothetical fixture typed in by the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchInput {
    pub home_team: String,
    pub away_team: String,
    pub features: FeatureVector,
}

impl Default for MatchInput {
    fn default() -> Self {
        Self {
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            features: FeatureVector::new(7.0, 6.0, 1.6, 1.2),
        }
    }
}

impl MatchInput {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.features.named() {
            let (min, max) = if name.ends_with("_FORM") {
                FORM_RANGE
            } else {
                AVG_GOALS_RANGE
            };
            if !(min..=max).contains(&value) {
                return Err(PredictorError::InputOutOfRange {
                    field: name,
                    min,
                    max,
                    value,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPrediction {
    pub market: Market,
    pub class: i32,
    pub label: DisplayLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub class: i32,
    pub label: DisplayLabel,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketProbabilities {
    Distribution {
        market: Market,
        classes: Vec<ClassProbability>,
    },
    Unavailable {
        market: Market,
    },
}

impl MarketProbabilities {
    pub fn market(&self) -> Market {
        match self {
            MarketProbabilities::Distribution { market, .. } => *market,
            MarketProbabilities::Unavailable { market } => *market,
        }
    }
}

pub fn predict_market(market: Market, model: &dyn Classifier, features: &FeatureVector) -> MarketPrediction {
    let class = model.predict(features);
    MarketPrediction {
        market,
        class,
        label: LabelMap::for_market(market).lookup(class),
    }
}

pub fn predict_markets(registry: &ModelRegistry, features: &FeatureVector) -> Vec<MarketPrediction> {
    registry
        .iter()
        .map(|(market, model)| predict_market(market, model, features))
        .collect()
}

pub fn market_distribution(
    market: Market,
    model: &dyn Classifier,
    features: &FeatureVector,
) -> MarketProbabilities {
    let Some(probs) = model.predict_proba(features) else {
        warn!(market = %market, "model has no probability outputs");
        return MarketProbabilities::Unavailable { market };
    };
    let map = LabelMap::for_market(market);
    let classes = model
        .classes()
        .iter()
        .zip(probs)
        .map(|(&class, probability)| ClassProbability {
            class,
            label: map.lookup(class),
            probability,
        })
        .collect();
    MarketProbabilities::Distribution { market, classes }
}

/// One entry per market; a model without probabilities never stops the others.
pub fn market_probabilities(registry: &ModelRegistry, features: &FeatureVector) -> Vec<MarketProbabilities> {
    registry
        .iter()
        .map(|(market, model)| market_distribution(market, model, features))
        .collect()
}
