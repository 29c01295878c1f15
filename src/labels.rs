use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "HDA")]
    Hda,
    #[serde(rename = "OVER25")]
    Over25,
    #[serde(rename = "BTTS")]
    Btts,
    #[serde(rename = "DOUBLE_CHANCE")]
    DoubleChance,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Hda, Market::Over25, Market::Btts, Market::DoubleChance];

    pub fn column(&self) -> &'static str {
        match self {
            Market::Hda => "HDA",
            Market::Over25 => "OVER25",
            Market::Btts => "BTTS",
            Market::DoubleChance => "DOUBLE_CHANCE",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Market::ALL.into_iter().find(|m| m.column() == column)
    }

    pub fn artifact_file_name(&self) -> String {
        format!("MODEL_{}.json", self.column())
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Settled market outcomes for one final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchLabels {
    #[serde(rename = "HDA")]
    pub hda: i32,
    #[serde(rename = "OVER25")]
    pub over25: i32,
    #[serde(rename = "BTTS")]
    pub btts: i32,
    #[serde(rename = "DOUBLE_CHANCE")]
    pub double_chance: i32,
}

impl MatchLabels {
    pub fn get(&self, market: Market) -> i32 {
        match market {
            Market::Hda => self.hda,
            Market::Over25 => self.over25,
            Market::Btts => self.btts,
            Market::DoubleChance => self.double_chance,
        }
    }
}

const OVER_LINE: f64 = 2.5;

pub fn derive_labels(home_goals: u8, away_goals: u8) -> MatchLabels {
    let hda = if home_goals > away_goals {
        1
    } else if home_goals == away_goals {
        0
    } else {
        -1
    };
    let total = f64::from(home_goals) + f64::from(away_goals);

    MatchLabels {
        hda,
        over25: i32::from(total > OVER_LINE),
        btts: i32::from(home_goals > 0 && away_goals > 0),
        // Home win or draw only.
        double_chance: i32::from(home_goals >= away_goals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_line_needs_three_goals() {
        assert_eq!(derive_labels(1, 1).over25, 0);
        assert_eq!(derive_labels(2, 1).over25, 1);
        assert_eq!(derive_labels(0, 3).over25, 1);
    }

    #[test]
    fn market_columns_round_trip() {
        for market in Market::ALL {
            assert_eq!(Market::from_column(market.column()), Some(market));
        }
        assert_eq!(Market::from_column("CORNERS"), None);
        assert_eq!(Market::DoubleChance.artifact_file_name(), "MODEL_DOUBLE_CHANCE.json");
    }

    #[test]
    fn labels_index_by_market() {
        let labels = derive_labels(0, 2);
        assert_eq!(labels.get(Market::Hda), -1);
        assert_eq!(labels.get(Market::DoubleChance), 0);
    }
}
