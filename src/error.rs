use derive_more::{Display, Error};

use crate::model::SubscriptionTier;

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum MarketDataError {
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("database migration failed")]
    Migration,
    #[display("failed to insert data")]
    Insert,
    #[display("failed to query data")]
    Query,
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Failures surfaced by the prediction flow.
///
/// `InvalidTicker`, `NoData` and `RateLimited` are client-visible outcomes;
/// the remaining variants wrap collaborator failures and carry their report
/// chain.
#[derive(Debug, Display, Error)]
pub enum PredictionError {
    #[display("invalid ticker symbol \"{ticker}\"")]
    InvalidTicker { ticker: String },
    #[display("unable to fetch data for ticker {ticker}")]
    NoData { ticker: String },
    #[display("daily prediction limit reached ({limit}/day for {tier} tier)")]
    RateLimited { limit: u32, tier: SubscriptionTier },
    #[display("market data provider failed")]
    MarketData,
    #[display("prediction storage failed")]
    Storage,
    #[display("indicator calculation failed")]
    Indicator,
}
