pub mod heuristic;
pub mod quota;
pub mod scoring;

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use error_stack::{Report, ResultExt};
use tracing::info;
use uuid::Uuid;

use crate::config::{AppConfig, HeuristicConfig, RateLimits};
use crate::error::PredictionError;
use crate::indicator::FeatureCalculator;
use crate::market_data::MarketData;
use crate::model::{Lookback, PredictionRecord, PredictionStats, Timeframe, User, normalize_ticker};
use crate::storage::Storage;

use self::quota::{check_quota, window_start};
use self::scoring::ScoringStrategy;

const TOP_TICKERS: usize = 5;

/// Immutable settings for the prediction flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSettings {
    pub heuristic: HeuristicConfig,
    pub rate_limits: RateLimits,
    pub lookback: Lookback,
}

impl PredictionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            heuristic: config.heuristic,
            rate_limits: config.rate_limits,
            lookback: config.market_data.lookback(),
        }
    }
}

/// Runs a prediction end to end: quota, market data, features, heuristic, storage.
pub struct PredictionService {
    storage: Arc<dyn Storage>,
    market_data: Arc<dyn MarketData>,
    scoring: Box<dyn ScoringStrategy>,
    calculator: FeatureCalculator,
    settings: PredictionSettings,
}

impl PredictionService {
    pub fn new(
        storage: Arc<dyn Storage>,
        market_data: Arc<dyn MarketData>,
        scoring: Box<dyn ScoringStrategy>,
        settings: PredictionSettings,
    ) -> Result<Self, Report<PredictionError>> {
        Ok(Self {
            storage,
            market_data,
            scoring,
            calculator: FeatureCalculator::new().change_context(PredictionError::Indicator)?,
            settings,
        })
    }

    pub async fn predict(
        &self,
        user: &User,
        ticker: &str,
        timeframe: Timeframe,
    ) -> Result<PredictionRecord, Report<PredictionError>> {
        let ticker = validated_ticker(ticker)?;
        let now = Utc::now().trunc_subsecs(6);
        let limits = &self.settings.rate_limits;

        let usage = check_quota(self.storage.as_ref(), user, limits, now).await?;

        let series = self
            .market_data
            .fetch_history(&ticker, self.settings.lookback)
            .await
            .change_context(PredictionError::MarketData)
            .attach_with(|| format!("provider: {}", self.market_data.name()))?;

        if series.is_empty() {
            return Err(Report::new(PredictionError::NoData { ticker }));
        }

        let features = self
            .calculator
            .compute(&series)
            .change_context(PredictionError::Indicator)
            .attach_with(|| format!("ticker: {ticker}"))?;

        let outcome = heuristic::generate(
            &features,
            timeframe,
            &self.settings.heuristic,
            self.scoring.as_ref(),
        );

        let record = PredictionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            ticker,
            timeframe,
            outcome,
            features,
            created_at: now,
        };

        let limit = limits.limit_for(user.tier);
        let appended = self
            .storage
            .append_prediction(&record, window_start(now), limit)
            .await
            .change_context(PredictionError::Storage)?;

        if appended.is_none() {
            return Err(Report::new(PredictionError::RateLimited {
                limit,
                tier: user.tier,
            })
            .attach(format!("user: {} (cap reached while predicting)", user.id)));
        }

        info!(
            user = %user.id,
            ticker = %record.ticker,
            timeframe = %timeframe,
            direction = %record.outcome.direction,
            probability = record.outcome.probability,
            remaining = usage.remaining().saturating_sub(1),
            "prediction stored"
        );

        Ok(record)
    }

    /// The caller's past predictions, newest first.
    pub async fn history(
        &self,
        user: &User,
        ticker: Option<&str>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, Report<PredictionError>> {
        let ticker = ticker.map(validated_ticker).transpose()?;
        self.storage
            .list_predictions(&user.id, ticker.as_deref(), skip, limit)
            .await
            .change_context(PredictionError::Storage)
    }

    /// One of the caller's predictions by id; `None` when it does not exist
    /// or belongs to another user.
    pub async fn get(
        &self,
        user: &User,
        id: &str,
    ) -> Result<Option<PredictionRecord>, Report<PredictionError>> {
        let record = self
            .storage
            .get_prediction(id)
            .await
            .change_context(PredictionError::Storage)?;
        Ok(record.filter(|r| r.user_id == user.id))
    }

    pub async fn stats(&self, user: &User) -> Result<PredictionStats, Report<PredictionError>> {
        let since = window_start(Utc::now());

        let total_predictions = self
            .storage
            .count_all_predictions(&user.id)
            .await
            .change_context(PredictionError::Storage)?;
        let predictions_today = self
            .storage
            .count_predictions(&user.id, since)
            .await
            .change_context(PredictionError::Storage)?;
        let top_tickers = self
            .storage
            .top_tickers(&user.id, TOP_TICKERS)
            .await
            .change_context(PredictionError::Storage)?;

        Ok(PredictionStats {
            total_predictions,
            predictions_today,
            daily_limit: self.settings.rate_limits.limit_for(user.tier),
            top_tickers,
        })
    }
}

fn validated_ticker(raw: &str) -> Result<String, Report<PredictionError>> {
    normalize_ticker(raw).ok_or_else(|| {
        Report::new(PredictionError::InvalidTicker {
            ticker: raw.to_string(),
        })
    })
}
