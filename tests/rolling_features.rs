use std::collections::HashMap;

use epl_predictor::dataset::assemble_training_table;
use epl_predictor::features::{FORM_WINDOW, Side, compute_rolling_features, match_points};
use epl_predictor::match_data::Match;

fn long_season() -> Vec<Match> {
    let teams = ["ARS", "AVL", "BOU", "BRE", "CHE", "EVE"];
    let mut out = Vec::new();
    for round in 0..12 {
        for i in 0..teams.len() / 2 {
            let home = teams[(round + i) % teams.len()];
            let away = teams[(round + teams.len() - 1 - i) % teams.len()];
            if home == away {
                continue;
            }
            let hg = ((round * 7 + i * 3) % 5) as u8;
            let ag = ((round * 5 + i * 2) % 4) as u8;
            out.push(Match::new(home, away, hg, ag));
        }
    }
    out
}

// Recomputes each row from scratch using only that team's earlier rows in the same role.
fn brute_force(matches: &[Match]) -> Vec<[f64; 4]> {
    matches
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            let home_hist: Vec<&Match> = matches[..=idx]
                .iter()
                .filter(|x| x.home_team == m.home_team)
                .collect();
            let away_hist: Vec<&Match> = matches[..=idx]
                .iter()
                .filter(|x| x.away_team == m.away_team)
                .collect();
            let home_win = &home_hist[home_hist.len().saturating_sub(FORM_WINDOW)..];
            let away_win = &away_hist[away_hist.len().saturating_sub(FORM_WINDOW)..];

            let home_form: u32 = home_win
                .iter()
                .map(|x| u32::from(match_points(x.home_goals, x.away_goals, Side::Home)))
                .sum();
            let away_form: u32 = away_win
                .iter()
                .map(|x| u32::from(match_points(x.home_goals, x.away_goals, Side::Away)))
                .sum();
            let home_goals: u32 = home_win.iter().map(|x| u32::from(x.home_goals)).sum();
            let away_goals: u32 = away_win.iter().map(|x| u32::from(x.away_goals)).sum();
            [
                f64::from(home_form),
                f64::from(away_form),
                f64::from(home_goals) / home_win.len() as f64,
                f64::from(away_goals) / away_win.len() as f64,
            ]
        })
        .collect()
}

#[test]
fn first_appearance_uses_only_that_match() {
    let matches = long_season();
    let feats = compute_rolling_features(&matches);

    let mut seen_home: HashMap<&str, ()> = HashMap::new();
    let mut seen_away: HashMap<&str, ()> = HashMap::new();
    for (m, f) in matches.iter().zip(&feats) {
        if seen_home.insert(m.home_team.as_str(), ()).is_none() {
            assert_eq!(f.home_form, f64::from(match_points(m.home_goals, m.away_goals, Side::Home)));
            assert_eq!(f.home_avg_goals, f64::from(m.home_goals));
        }
        if seen_away.insert(m.away_team.as_str(), ()).is_none() {
            assert_eq!(f.away_form, f64::from(match_points(m.home_goals, m.away_goals, Side::Away)));
            assert_eq!(f.away_avg_goals, f64::from(m.away_goals));
        }
    }
}

#[test]
fn windows_are_causal_and_capped_at_five() {
    let matches = long_season();
    let feats = compute_rolling_features(&matches);
    let expected = brute_force(&matches);
    assert_eq!(feats.len(), expected.len());
    for (got, want) in feats.iter().zip(&expected) {
        let got = got.as_array();
        for k in 0..4 {
            assert!((got[k] - want[k]).abs() < 1e-9, "got {got:?}, want {want:?}");
        }
        assert!(got[0] <= 15.0 && got[1] <= 15.0);
    }
}

#[test]
fn later_rows_never_change_earlier_features() {
    let matches = long_season();
    let full = compute_rolling_features(&matches);
    let prefix = compute_rolling_features(&matches[..10]);
    assert_eq!(&full[..10], &prefix[..]);
}

#[test]
fn sixth_home_game_drops_the_first() {
    let mut matches = Vec::new();
    matches.push(Match::new("LIV", "X1", 5, 0));
    for i in 0..5 {
        matches.push(Match::new("LIV", format!("Y{i}"), 0, 0));
    }
    let feats = compute_rolling_features(&matches);
    assert_eq!(feats[4].home_form, 3.0 + 4.0);
    assert!((feats[4].home_avg_goals - 1.0).abs() < 1e-12);
    assert_eq!(feats[5].home_form, 5.0);
    assert_eq!(feats[5].home_avg_goals, 0.0);
}

#[test]
fn recomputation_is_deterministic() {
    let matches = long_season();
    assert_eq!(compute_rolling_features(&matches), compute_rolling_features(&matches));
}

#[test]
fn assembler_keeps_one_row_per_match() {
    let matches = long_season();
    let rows = assemble_training_table(&matches);
    assert_eq!(rows.len(), matches.len());
    for (row, m) in rows.iter().zip(&matches) {
        assert_eq!(row.home_team, m.home_team);
        assert_eq!(row.away_team, m.away_team);
        assert_eq!(row.home_goals, m.home_goals);
    }
    assert!(assemble_training_table(&[]).is_empty());
}
