//! Rolling form and goal features.
//!
//! Every match gets four numbers describing how the home side has done in its recent
//! home games and how the away side has done in its recent away games. Windows are
//! causal: a row only sees rows at or before it in table order.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::match_data::Match;

pub const FORM_WINDOW: usize = 5;

pub const FEATURE_NAMES: [&str; 4] = ["HOME_FORM", "AWAY_FORM", "HOME_AVG_GOALS", "AWAY_AVG_GOALS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureVector {
    #[serde(rename = "HOME_FORM")]
    pub home_form: f64,
    #[serde(rename = "AWAY_FORM")]
    pub away_form: f64,
    #[serde(rename = "HOME_AVG_GOALS")]
    pub home_avg_goals: f64,
    #[serde(rename = "AWAY_AVG_GOALS")]
    pub away_avg_goals: f64,
}

impl FeatureVector {
    pub fn new(home_form: f64, away_form: f64, home_avg_goals: f64, away_avg_goals: f64) -> Self {
        Self {
            home_form,
            away_form,
            home_avg_goals,
            away_avg_goals,
        }
    }

    /// Positional layout handed to classifiers; matches `FEATURE_NAMES`.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.home_form,
            self.away_form,
            self.home_avg_goals,
            self.away_avg_goals,
        ]
    }

    pub fn named(&self) -> [(&'static str, f64); 4] {
        let values = self.as_array();
        [
            (FEATURE_NAMES[0], values[0]),
            (FEATURE_NAMES[1], values[1]),
            (FEATURE_NAMES[2], values[2]),
            (FEATURE_NAMES[3], values[3]),
        ]
    }
}

/// 3 for a win, 1 for a draw, 0 for a loss, from `side`'s point of view.
pub fn match_points(home_goals: u8, away_goals: u8, side: Side) -> u8 {
    let (scored, conceded) = match side {
        Side::Home => (home_goals, away_goals),
        Side::Away => (away_goals, home_goals),
    };
    if scored > conceded {
        3
    } else if scored == conceded {
        1
    } else {
        0
    }
}

/// Trailing window of (points, goals) observations for one team in one venue role.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    entries: VecDeque<(u8, u8)>,
    points_sum: u32,
    goals_sum: u32,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            points_sum: 0,
            goals_sum: 0,
        }
    }

    pub fn push(&mut self, points: u8, goals: u8) {
        if self.entries.len() == self.capacity {
            if let Some((old_points, old_goals)) = self.entries.pop_front() {
                self.points_sum -= u32::from(old_points);
                self.goals_sum -= u32::from(old_goals);
            }
        }
        self.entries.push_back((points, goals));
        self.points_sum += u32::from(points);
        self.goals_sum += u32::from(goals);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn form(&self) -> f64 {
        f64::from(self.points_sum)
    }

    pub fn avg_goals(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        f64::from(self.goals_sum) / self.entries.len() as f64
    }
}

/// One feature vector per match, aligned with the input slice.
pub fn compute_rolling_features(matches: &[Match]) -> Vec<FeatureVector> {
    compute_rolling_features_with_window(matches, FORM_WINDOW)
}

pub fn compute_rolling_features_with_window(matches: &[Match], window: usize) -> Vec<FeatureVector> {
    let mut home_windows: HashMap<&str, RollingWindow> = HashMap::new();
    let mut away_windows: HashMap<&str, RollingWindow> = HashMap::new();
    let mut out = Vec::with_capacity(matches.len());

    for m in matches {
        let home = home_windows
            .entry(m.home_team.as_str())
            .or_insert_with(|| RollingWindow::new(window));
        home.push(match_points(m.home_goals, m.away_goals, Side::Home), m.home_goals);
        let (home_form, home_avg_goals) = (home.form(), home.avg_goals());

        let away = away_windows
            .entry(m.away_team.as_str())
            .or_insert_with(|| RollingWindow::new(window));
        away.push(match_points(m.home_goals, m.away_goals, Side::Away), m.away_goals);

        out.push(FeatureVector {
            home_form,
            away_form: away.form(),
            home_avg_goals,
            away_avg_goals: away.avg_goals(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_follow_three_one_zero() {
        assert_eq!(match_points(2, 1, Side::Home), 3);
        assert_eq!(match_points(2, 1, Side::Away), 0);
        assert_eq!(match_points(1, 1, Side::Home), 1);
        assert_eq!(match_points(1, 1, Side::Away), 1);
        assert_eq!(match_points(0, 4, Side::Away), 3);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = RollingWindow::new(2);
        w.push(3, 2);
        w.push(0, 0);
        w.push(1, 1);
        assert_eq!(w.len(), 2);
        assert_eq!(w.form(), 1.0);
        assert!((w.avg_goals() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn home_and_away_histories_are_independent() {
        let matches = vec![
            Match::new("Arsenal", "Spurs", 3, 0),
            Match::new("Spurs", "Arsenal", 2, 2),
            Match::new("Arsenal", "Spurs", 0, 1),
        ];
        let feats = compute_rolling_features(&matches);

        // Arsenal at home: W then L.
        assert_eq!(feats[2].home_form, 3.0);
        assert!((feats[2].home_avg_goals - 1.5).abs() < 1e-12);
        // Spurs away: L then W.
        assert_eq!(feats[2].away_form, 3.0);
        assert!((feats[2].away_avg_goals - 0.5).abs() < 1e-12);
        // Arsenal's only away game so far.
        assert_eq!(feats[1].away_form, 1.0);
        assert_eq!(feats[1].away_avg_goals, 2.0);
    }
}
