use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use epl_predictor::classifier::ModelArtifact;
use epl_predictor::config::{self, TrainConfig};
use epl_predictor::dataset::{TrainingRow, assemble_training_table, train_test_split};
use epl_predictor::forest::RandomForest;
use epl_predictor::labels::Market;
use epl_predictor::match_data::load_matches_csv;
use epl_predictor::metrics::classification_report;

const HEAD_ROWS: usize = 20;

fn main() -> Result<()> {
    config::load_dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("install tracing subscriber")?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = TrainConfig::from_args_and_env(&args);

    let matches = load_matches_csv(&cfg.matches_csv)
        .with_context(|| format!("load results from {}", cfg.matches_csv.display()))?;
    info!(rows = matches.len(), path = %cfg.matches_csv.display(), "results loaded");

    let table = assemble_training_table(&matches);
    let split = train_test_split(&table, cfg.test_fraction, cfg.split_seed);
    info!(
        train = split.train.len(),
        test = split.test.len(),
        trees = cfg.forest.n_trees,
        seed = cfg.forest.seed,
        "fitting markets"
    );

    for market in Market::ALL {
        let (x_train, y_train) = split.train_xy(market);
        let (x_test, y_test) = split.test_xy(market);

        let forest = RandomForest::fit(&x_train, &y_train, cfg.forest)
            .with_context(|| format!("fit {market}"))?;
        let y_pred = x_test
            .iter()
            .map(|row| forest.predict_row(row))
            .collect::<Vec<_>>();

        println!("===== {market} =====");
        println!("{}", classification_report(&y_test, &y_pred));

        ModelArtifact::new(market, forest)
            .save(&cfg.out_dir)
            .with_context(|| format!("save {market} model"))?;
        info!(market = %market, dir = %cfg.out_dir.display(), "model saved");
    }

    print_head(&table, HEAD_ROWS);
    Ok(())
}

fn print_head(rows: &[TrainingRow], n: usize) {
    println!(
        "{:>4} {:<16} {:<16} {:>4} {:>4} {:>9} {:>9} {:>14} {:>14} {:>4} {:>6} {:>4} {:>13}",
        "",
        "HomeTeam",
        "AwayTeam",
        "FTHG",
        "FTAG",
        "HOME_FORM",
        "AWAY_FORM",
        "HOME_AVG_GOALS",
        "AWAY_AVG_GOALS",
        "HDA",
        "OVER25",
        "BTTS",
        "DOUBLE_CHANCE"
    );
    for (idx, row) in rows.iter().take(n).enumerate() {
        let f = row.features;
        let l = row.labels;
        println!(
            "{:>4} {:<16} {:<16} {:>4} {:>4} {:>9.1} {:>9.1} {:>14.2} {:>14.2} {:>4} {:>6} {:>4} {:>13}",
            idx,
            row.home_team,
            row.away_team,
            row.home_goals,
            row.away_goals,
            f.home_form,
            f.away_form,
            f.home_avg_goals,
            f.away_avg_goals,
            l.hda,
            l.over25,
            l.btts,
            l.double_chance
        );
    }
}
