use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::features::{FeatureVector, compute_rolling_features};
use crate::labels::{Market, MatchLabels, derive_labels};
use crate::match_data::Match;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRow {
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u8,
    pub away_goals: u8,
    #[serde(flatten)]
    pub features: FeatureVector,
    #[serde(flatten)]
    pub labels: MatchLabels,
}

impl TrainingRow {
    pub fn label(&self, market: Market) -> i32 {
        self.labels.get(market)
    }
}

/// Exactly one row per input match, in input order.
pub fn assemble_training_table(matches: &[Match]) -> Vec<TrainingRow> {
    let features = compute_rolling_features(matches);
    matches
        .iter()
        .zip(features)
        .map(|(m, features)| TrainingRow {
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            home_goals: m.home_goals,
            away_goals: m.away_goals,
            features,
            labels: derive_labels(m.home_goals, m.away_goals),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Split<'a> {
    pub train: Vec<&'a TrainingRow>,
    pub test: Vec<&'a TrainingRow>,
}

impl Split<'_> {
    pub fn train_xy(&self, market: Market) -> (Vec<[f64; 4]>, Vec<i32>) {
        design_matrix(&self.train, market)
    }

    pub fn test_xy(&self, market: Market) -> (Vec<[f64; 4]>, Vec<i32>) {
        design_matrix(&self.test, market)
    }
}

/// Seeded shuffle, then the first `ceil(n * test_fraction)` rows become the test set.
pub fn train_test_split(rows: &[TrainingRow], test_fraction: f64, seed: u64) -> Split<'_> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let fraction = test_fraction.clamp(0.0, 1.0);
    let n_test = ((rows.len() as f64) * fraction).ceil() as usize;
    let n_test = n_test.min(rows.len());

    let test = order[..n_test].iter().map(|&i| &rows[i]).collect();
    let train = order[n_test..].iter().map(|&i| &rows[i]).collect();
    Split { train, test }
}

pub fn design_matrix(rows: &[&TrainingRow], market: Market) -> (Vec<[f64; 4]>, Vec<i32>) {
    rows.iter()
        .map(|row| (row.features.as_array(), row.label(market)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(n: usize) -> Vec<Match> {
        let teams = ["ARS", "CHE", "LIV", "MCI"];
        (0..n)
            .map(|i| {
                let home = teams[i % teams.len()];
                let away = teams[(i + 1) % teams.len()];
                Match::new(home, away, (i % 4) as u8, (i % 3) as u8)
            })
            .collect()
    }

    #[test]
    fn split_partitions_every_row_once() {
        let rows = assemble_training_table(&season(37));
        let split = train_test_split(&rows, DEFAULT_TEST_FRACTION, DEFAULT_SPLIT_SEED);
        assert_eq!(split.test.len(), 8);
        assert_eq!(split.train.len() + split.test.len(), rows.len());

        let mut seen: Vec<*const TrainingRow> = split
            .train
            .iter()
            .chain(split.test.iter())
            .map(|r| *r as *const TrainingRow)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), rows.len());
    }

    #[test]
    fn split_is_seeded() {
        let rows = assemble_training_table(&season(20));
        let a = train_test_split(&rows, 0.2, 7);
        let b = train_test_split(&rows, 0.2, 7);
        assert_eq!(a.test, b.test);
    }
}
