pub mod auth;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod labels;
pub mod match_data;
pub mod metrics;
pub mod predict;
pub mod prediction_log;
pub mod session;
pub mod state;
