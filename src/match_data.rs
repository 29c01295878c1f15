use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PredictorError, Result};

/// One finished fixture. Position in the loaded table is its chronology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u8,
    pub away_goals: u8,
}

impl Match {
    pub fn new(home_team: impl Into<String>, away_team: impl Into<String>, home_goals: u8, away_goals: u8) -> Self {
        Self {
            home_team: home_team.into(),
            away_team: away_team.into(),
            home_goals,
            away_goals,
        }
    }

    pub fn total_goals(&self) -> u32 {
        u32::from(self.home_goals) + u32::from(self.away_goals)
    }
}

// football-data.co.uk layout; every other column in the file is ignored.
#[derive(Debug, Deserialize)]
struct RawResultRow {
    #[serde(rename = "HomeTeam", default)]
    home_team: Option<String>,
    #[serde(rename = "AwayTeam", default)]
    away_team: Option<String>,
    #[serde(rename = "FTHG", default)]
    fthg: Option<u8>,
    #[serde(rename = "FTAG", default)]
    ftag: Option<u8>,
}

pub fn load_matches_csv(path: &Path) -> Result<Vec<Match>> {
    let file = std::fs::File::open(path)?;
    read_matches(file)
}

pub fn read_matches<R: Read>(reader: R) -> Result<Vec<Match>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for (idx, row) in rdr.deserialize::<RawResultRow>().enumerate() {
        let row = row?;
        let data_row = idx + 1;

        let home_team = non_blank(row.home_team);
        let away_team = non_blank(row.away_team);
        // Spreadsheet exports often end with comma-only padding rows.
        if home_team.is_none() && away_team.is_none() && row.fthg.is_none() && row.ftag.is_none() {
            continue;
        }

        out.push(Match {
            home_team: home_team.ok_or(PredictorError::MissingValue {
                column: "HomeTeam",
                row: data_row,
            })?,
            away_team: away_team.ok_or(PredictorError::MissingValue {
                column: "AwayTeam",
                row: data_row,
            })?,
            home_goals: row.fthg.ok_or(PredictorError::MissingValue {
                column: "FTHG",
                row: data_row,
            })?,
            away_goals: row.ftag.ok_or(PredictorError::MissingValue {
                column: "FTAG",
                row: data_row,
            })?,
        });
    }
    Ok(out)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_football_data_columns_and_ignores_the_rest() {
        let raw = "Div,Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR\n\
                   E0,16/08/2024,Man United,Fulham,1,0,H\n\
                   E0,17/08/2024,Ipswich,Liverpool,0,2,A\n";
        let matches = read_matches(raw.as_bytes()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0], Match::new("Man United", "Fulham", 1, 0));
        assert_eq!(matches[1].away_team, "Liverpool");
        assert_eq!(matches[1].total_goals(), 2);
    }

    #[test]
    fn skips_padding_rows() {
        let raw = "HomeTeam,AwayTeam,FTHG,FTAG\nArsenal,Wolves,2,0\n,,,\n";
        let matches = read_matches(raw.as_bytes()).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn missing_goals_are_reported_with_row() {
        let raw = "HomeTeam,AwayTeam,FTHG,FTAG\nArsenal,Wolves,2,0\nEverton,Brighton,,1\n";
        let err = read_matches(raw.as_bytes()).unwrap_err();
        match err {
            PredictorError::MissingValue { column, row } => {
                assert_eq!(column, "FTHG");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
