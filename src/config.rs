use std::env;
use std::path::PathBuf;

use crate::forest::ForestConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_dir: PathBuf,
    pub predictions_log: PathBuf,
    pub secrets_path: PathBuf,
    pub app_log: PathBuf,
}

impl AppConfig {
    /// Call after `load_dotenv` so `.env` values are visible.
    pub fn from_env() -> Self {
        Self {
            model_dir: env_path("MODEL_DIR").unwrap_or_else(|| PathBuf::from(".")),
            predictions_log: env_path("PREDICTIONS_LOG")
                .unwrap_or_else(|| PathBuf::from("predictions_log.csv")),
            secrets_path: env_path("SECRETS_PATH").unwrap_or_else(|| PathBuf::from("secrets.json")),
            app_log: env_path("APP_LOG_PATH").unwrap_or_else(|| PathBuf::from("epl_predictor.log")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub matches_csv: PathBuf,
    pub out_dir: PathBuf,
    pub forest: ForestConfig,
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl TrainConfig {
    pub fn from_args_and_env(args: &[String]) -> Self {
        let mut forest = ForestConfig::default();
        if let Some(n) = env_parse::<usize>("FOREST_TREES") {
            forest.n_trees = n.max(1);
        }
        if let Some(seed) = env_parse::<u64>("FOREST_SEED") {
            forest.seed = seed;
        }
        if let Some(depth) = env_parse::<usize>("FOREST_MAX_DEPTH") {
            forest.max_depth = Some(depth.max(1));
        }

        Self {
            matches_csv: path_arg(args, "--csv").unwrap_or_else(|| PathBuf::from("E0.csv")),
            out_dir: path_arg(args, "--out")
                .or_else(|| env_path("MODEL_DIR"))
                .unwrap_or_else(|| PathBuf::from(".")),
            forest,
            test_fraction: crate::dataset::DEFAULT_TEST_FRACTION,
            split_seed: crate::dataset::DEFAULT_SPLIT_SEED,
        }
    }
}

pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Accepts `--flag=value` and `--flag value`.
pub fn path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::path_arg;
    use std::path::PathBuf;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn path_arg_accepts_both_forms() {
        assert_eq!(
            path_arg(&args(&["--csv=data/E0.csv"]), "--csv"),
            Some(PathBuf::from("data/E0.csv"))
        );
        assert_eq!(
            path_arg(&args(&["--out", "models"]), "--out"),
            Some(PathBuf::from("models"))
        );
        assert_eq!(path_arg(&args(&["--out"]), "--out"), None);
        assert_eq!(path_arg(&args(&["--csv="]), "--csv"), None);
    }
}
