use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("{what} must be a mapping, got {kind}")]
    InvalidRecord { what: &'static str, kind: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    InputOutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} is not a number: {raw:?}")]
    InvalidNumber { field: &'static str, raw: String },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Please log in first.")]
    NotLoggedIn,

    #[error("Access denied. Admin only.")]
    AdminOnly,

    #[error("Model format error: {0}")]
    ModelFormat(String),

    #[error("Cannot fit a classifier on an empty data set")]
    EmptyDataset,

    #[error("Missing value for {column} on data row {row}")]
    MissingValue { column: &'static str, row: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PredictorError>;
