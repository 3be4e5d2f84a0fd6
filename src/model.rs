use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription level controlling the daily prediction quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Elite,
}

impl SubscriptionTier {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "elite" => Some(Self::Elite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Elite => "elite",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Horizon a prediction is made for.
///
/// String representations match the CLI and storage format (`"1d"`, `"1w"`, `"1m"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1m")]
    Month,
}

impl Timeframe {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::Day),
            "1w" => Some(Self::Week),
            "1m" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "1d",
            Self::Week => "1w",
            Self::Month => "1m",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far back the market-data provider is asked to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookback {
    Month1,
    Month3,
    Month6,
    Year1,
}

impl Lookback {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            "6mo" => Some(Self::Month6),
            "1y" => Some(Self::Year1),
            _ => None,
        }
    }

    /// Return the Yahoo chart `range` parameter for this lookback.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}

/// A single daily bar. Only the close and volume feed the indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
}

/// Chronological (oldest first) price history for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.volume).collect()
    }
}

/// Technical indicators derived from a `PriceSeries`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rsi: f64,
    pub ma_20: f64,
    pub ma_50: f64,
    pub volume_ratio: f64,
    pub price_position: f64,
    pub current_price: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub direction: Direction,
    pub probability: f64,
    pub confidence: f64,
    pub target_price: f64,
    pub stop_loss: f64,
}

/// Append-only record of one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub user_id: String,
    pub ticker: String,
    pub timeframe: Timeframe,
    pub outcome: PredictionOutcome,
    pub features: FeatureVector,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerCount {
    pub ticker: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionStats {
    pub total_predictions: u64,
    pub predictions_today: u64,
    pub daily_limit: u32,
    pub top_tickers: Vec<TickerCount>,
}

const MAX_TICKER_LEN: usize = 12;

/// Trim and upper-case a ticker symbol.
///
/// Returns `None` for empty or overlong input and for characters outside
/// ASCII alphanumerics and `. - ^ =`.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    let valid = !ticker.is_empty()
        && ticker.len() <= MAX_TICKER_LEN
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    valid.then_some(ticker)
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_known_labels() {
        let frames = [
            ("1d", Timeframe::Day),
            ("1w", Timeframe::Week),
            ("1m", Timeframe::Month),
        ];
        for (s, tf) in frames {
            assert_eq!(Timeframe::from_str(s), Some(tf));
            assert_eq!(tf.as_str(), s);
        }
    }

    #[test]
    fn timeframe_invalid_string_returns_none() {
        assert_eq!(Timeframe::from_str("4h"), None);
        assert_eq!(Timeframe::from_str(""), None);
    }

    #[test]
    fn timeframe_serializes_as_label() {
        let json = serde_json::to_string(&Timeframe::Week).unwrap();
        assert_eq!(json, "\"1w\"");
    }

    #[test]
    fn tier_display_and_parse() {
        assert_eq!(SubscriptionTier::Elite.to_string(), "elite");
        assert_eq!(SubscriptionTier::from_str("pro"), Some(SubscriptionTier::Pro));
        assert_eq!(SubscriptionTier::from_str("gold"), None);
    }

    #[test]
    fn direction_serializes_lowercase() {
        let json = serde_json::to_string(&Direction::Up).unwrap();
        assert_eq!(json, "\"up\"");
    }

    #[test]
    fn lookback_parses_known_ranges() {
        assert_eq!(Lookback::from_str("3mo"), Some(Lookback::Month3));
        assert_eq!(Lookback::from_str("5y"), None);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(104.00000000000001, 2), 104.0);
    }

    #[test]
    fn ticker_normalized_or_rejected() {
        assert_eq!(normalize_ticker(" brk-b ").as_deref(), Some("BRK-B"));
        assert_eq!(normalize_ticker("^gspc").as_deref(), Some("^GSPC"));
        assert_eq!(normalize_ticker("eurusd=x").as_deref(), Some("EURUSD=X"));
        assert_eq!(normalize_ticker(""), None);
        assert_eq!(normalize_ticker("A/../B"), None);
        assert_eq!(normalize_ticker("AAPL?range=1y"), None);
        assert_eq!(normalize_ticker("ABCDEFGHIJKLM"), None);
    }
}
