use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{Lookback, SubscriptionTier};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_lookback() -> String {
    "3mo".into()
}

fn default_requests_per_second() -> u32 {
    2
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Yahoo chart range, e.g. `"3mo"`.
    #[serde(default = "default_lookback")]
    pub lookback: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            lookback: default_lookback(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl MarketDataConfig {
    /// Parsed lookback; `validate` guarantees this is `Some` for loaded configs.
    pub fn lookback(&self) -> Lookback {
        Lookback::from_str(&self.lookback).unwrap_or(Lookback::Month3)
    }
}

/// Daily prediction cap per subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub free: u32,
    pub pro: u32,
    pub elite: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            free: 50,
            pro: 500,
            elite: 2000,
        }
    }
}

impl RateLimits {
    pub fn limit_for(&self, tier: SubscriptionTier) -> u32 {
        match tier {
            SubscriptionTier::Free => self.free,
            SubscriptionTier::Pro => self.pro,
            SubscriptionTier::Elite => self.elite,
        }
    }
}

/// Thresholds and weights of the additive prediction heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub oversold: f64,
    pub overbought: f64,
    pub rsi_weight: f64,
    pub low_band: f64,
    pub high_band: f64,
    pub position_weight: f64,
    pub volume_surge: f64,
    pub volume_weight: f64,
    /// Half-width of the uniform random perturbation. `0` disables it.
    pub jitter: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
            rsi_weight: 0.15,
            low_band: 0.3,
            high_band: 0.7,
            position_weight: 0.10,
            volume_surge: 1.5,
            volume_weight: 0.05,
            jitter: 0.05,
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const MAX_JITTER: f64 = 0.4;

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_market_data(config)?;
    validate_rate_limits(config)?;
    validate_heuristic(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let format = config.general.log_format.as_str();
    if !VALID_LOG_FORMATS.contains(&format) {
        return Err(invalid(format!(
            "general.log_format \"{format}\" is not one of text, json"
        )));
    }
    Ok(())
}

fn validate_market_data(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let md = &config.market_data;
    if Lookback::from_str(&md.lookback).is_none() {
        return Err(invalid(format!(
            "market_data.lookback: unknown range \"{}\"",
            md.lookback
        )));
    }
    if md.requests_per_second == 0 {
        return Err(invalid("market_data.requests_per_second must be > 0".into()));
    }
    Ok(())
}

fn validate_rate_limits(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let limits = &config.rate_limits;
    if limits.free == 0 {
        return Err(invalid("rate_limits.free must be > 0".into()));
    }
    if limits.pro < limits.free || limits.elite < limits.pro {
        return Err(invalid(format!(
            "rate_limits must not decrease by tier (free={}, pro={}, elite={})",
            limits.free, limits.pro, limits.elite
        )));
    }
    Ok(())
}

fn validate_heuristic(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let h = &config.heuristic;
    if !(0.0..=100.0).contains(&h.oversold) || h.oversold >= h.overbought || h.overbought > 100.0
    {
        return Err(invalid(format!(
            "heuristic.oversold ({}) must be below heuristic.overbought ({}) within [0, 100]",
            h.oversold, h.overbought
        )));
    }
    if !(0.0..=1.0).contains(&h.low_band) || h.low_band >= h.high_band || h.high_band > 1.0 {
        return Err(invalid(format!(
            "heuristic.low_band ({}) must be below heuristic.high_band ({}) within [0, 1]",
            h.low_band, h.high_band
        )));
    }
    if !(0.0..=MAX_JITTER).contains(&h.jitter) {
        return Err(invalid(format!(
            "heuristic.jitter ({}) must be within [0, {MAX_JITTER}]",
            h.jitter
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
data_dir = "/tmp/data"

[market_data]
base_url = "http://localhost:9000"
lookback = "6mo"
requests_per_second = 5

[rate_limits]
free = 10
pro = 100
elite = 1000

[heuristic]
oversold = 25.0
overbought = 75.0
jitter = 0.0
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.market_data.lookback(), Lookback::Month6);
        assert_eq!(config.rate_limits.limit_for(SubscriptionTier::Pro), 100);
        assert_eq!(config.heuristic.oversold, 25.0);
        // untouched keys keep their defaults
        assert_eq!(config.heuristic.volume_surge, 1.5);
        assert_eq!(config.heuristic.jitter, 0.0);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let toml = r#"
[general]
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.data_dir, "./data");
        assert_eq!(config.market_data.lookback(), Lookback::Month3);
        assert_eq!(config.market_data.requests_per_second, 2);
        assert_eq!(config.rate_limits, RateLimits::default());
        assert_eq!(config.heuristic, HeuristicConfig::default());
    }

    #[test]
    fn default_tier_caps() {
        let limits = RateLimits::default();
        assert_eq!(limits.limit_for(SubscriptionTier::Free), 50);
        assert_eq!(limits.limit_for(SubscriptionTier::Pro), 500);
        assert_eq!(limits.limit_for(SubscriptionTier::Elite), 2000);
    }

    #[test]
    fn unknown_lookback_rejected() {
        let config = parse(
            r#"
[general]

[market_data]
lookback = "10y"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = parse(
            r#"
[general]
log_format = "xml"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn decreasing_rate_limits_rejected() {
        let config = parse(
            r#"
[general]

[rate_limits]
free = 100
pro = 50
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn inverted_rsi_thresholds_rejected() {
        let config = parse(
            r#"
[general]

[heuristic]
oversold = 80.0
overbought = 20.0
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn oversized_jitter_rejected() {
        let config = parse(
            r#"
[general]

[heuristic]
jitter = 0.5
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_requests_per_second_rejected() {
        let config = parse(
            r#"
[general]

[market_data]
requests_per_second = 0
"#,
        );
        assert!(validate(&config).is_err());
    }
}
