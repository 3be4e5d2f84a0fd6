use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;
use crate::market_data::MarketData;
use crate::model::{Lookback, PricePoint, PriceSeries};

const PROVIDER: &str = "yahoo";
const CHART_PATH: &str = "/v8/finance/chart";
const DAILY_INTERVAL: &str = "1d";
const USER_AGENT: &str = concat!("stock-predictor/", env!("CARGO_PKG_VERSION"));

/// Daily history from the Yahoo Finance chart endpoint.
pub struct YahooMarketData {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooMarketData {
    pub fn new(config: &MarketDataConfig) -> Result<Self, Report<MarketDataError>> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero!(1u32));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .change_context(MarketDataError::Request {
                provider: PROVIDER.into(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }
}

impl MarketData for YahooMarketData {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_history(
        &self,
        ticker: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<MarketDataError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}{}/{}", self.base_url, CHART_PATH, ticker);
            let params = [("range", lookback.as_str()), ("interval", DAILY_INTERVAL)];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(MarketDataError::Request {
                    provider: PROVIDER.into(),
                })
                .attach_with(|| format!("ticker: {ticker}"))?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!(ticker = %ticker, "yahoo has no chart for ticker");
                return Ok(PriceSeries::new(ticker, Vec::new()));
            }

            if !response.status().is_success() {
                return Err(Report::new(MarketDataError::Request {
                    provider: PROVIDER.into(),
                })
                .attach(format!("HTTP status: {}", response.status())));
            }

            let body: ChartResponse =
                response
                    .json()
                    .await
                    .change_context(MarketDataError::ResponseParse {
                        provider: PROVIDER.into(),
                    })?;

            let series = body.into_series(&ticker);

            info!(
                ticker = %ticker,
                lookback = %lookback,
                fetched = series.len(),
                "yahoo history fetch complete"
            );

            Ok(series)
        })
    }
}

// ── Chart response types ──────────────────────────────────────────────────────

/// `{ "chart": { "result": [ ... ] | null, "error": { ... } | null } }`
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    /// Bar open times (seconds since epoch). Absent when the range is empty.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Flatten the first chart result into a series, dropping bars without a close.
    fn into_series(self, ticker: &str) -> PriceSeries {
        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return PriceSeries::new(ticker, Vec::new());
        };
        let Some(quote) = result.indicators.quote.into_iter().next() else {
            return PriceSeries::new(ticker, Vec::new());
        };

        let points = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let close = quote.close.get(i).copied().flatten()?;
                let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
                let timestamp = DateTime::from_timestamp(ts, 0)?;
                Some(PricePoint {
                    timestamp,
                    close,
                    volume,
                })
            })
            .collect();

        PriceSeries::new(ticker, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChartResponse {
        serde_json::from_str(json).expect("parse failed")
    }

    #[test]
    fn chart_parses_into_series() {
        let body = parse(
            r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},
                "timestamp":[1704153600,1704240000,1704326400],
                "indicators":{"quote":[{"open":[1,2,3],
                    "close":[185.64,184.25,181.91],
                    "volume":[82488700,58414500,71983600]}]}}],
                "error":null}}"#,
        );
        let series = body.into_series("AAPL");
        assert_eq!(series.ticker, "AAPL");
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].close, 185.64);
        assert_eq!(series.points[2].volume, 71_983_600.0);
        assert!(series.points[0].timestamp < series.points[1].timestamp);
    }

    #[test]
    fn bars_without_close_are_dropped() {
        let body = parse(
            r#"{"chart":{"result":[{"timestamp":[1,2,3],
                "indicators":{"quote":[{"close":[10.0,null,12.0],
                    "volume":[100,null,null]}]}}],"error":null}}"#,
        );
        let series = body.into_series("X");
        assert_eq!(series.closes(), vec![10.0, 12.0]);
        assert_eq!(series.volumes(), vec![100.0, 0.0]);
    }

    #[test]
    fn null_result_is_empty_series() {
        let body = parse(
            r#"{"chart":{"result":null,
                "error":{"code":"Not Found","description":"No data found"}}}"#,
        );
        assert!(body.into_series("NOPE").is_empty());
    }

    #[test]
    fn missing_timestamps_is_empty_series() {
        let body = parse(
            r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#,
        );
        assert!(body.into_series("NEW").is_empty());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = MarketDataConfig {
            base_url: "http://localhost:9000/".into(),
            ..MarketDataConfig::default()
        };
        let provider = YahooMarketData::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9000");
        assert_eq!(provider.name(), "yahoo");
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_history() {
        let provider = YahooMarketData::new(&MarketDataConfig::default()).unwrap();
        let series = provider
            .fetch_history("AAPL", Lookback::Month1)
            .await
            .unwrap();
        assert!(!series.is_empty());
    }
}
