pub mod ma;
pub mod range;
pub mod rsi;
pub mod volatility;
pub mod volume;

use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::model::{FeatureVector, PriceSeries, round_to};

use self::ma::TrailingMean;
use self::range::PricePosition;
use self::rsi::Rsi;
use self::volatility::Volatility;
use self::volume::VolumeRatio;

const SHORT_MA_PERIOD: usize = 20;
const LONG_MA_PERIOD: usize = 50;
const PRICE_PLACES: i32 = 2;
const VOLATILITY_PLACES: i32 = 4;

/// A technical indicator reducing a price series to a single value.
///
/// Series must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "ma_20").
    fn name(&self) -> &str;

    /// Minimum number of points required to produce a value.
    fn required_points(&self) -> usize;

    /// Calculate the indicator value for the most recent point of `series`.
    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>>;
}

/// Reject a series the indicators cannot be computed from.
pub(crate) fn ensure_points(
    indicator: &dyn Indicator,
    series: &PriceSeries,
) -> Result<(), Report<IndicatorError>> {
    if series.len() < indicator.required_points() {
        bail!(IndicatorError::InsufficientData {
            required: indicator.required_points(),
            available: series.len(),
        });
    }
    Ok(())
}

/// Derives the fixed `FeatureVector` consumed by the prediction heuristic.
pub struct FeatureCalculator {
    rsi: Rsi,
    ma_short: TrailingMean,
    ma_long: TrailingMean,
    volume_ratio: VolumeRatio,
    price_position: PricePosition,
    volatility: Volatility,
}

impl FeatureCalculator {
    pub fn new() -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            rsi: Rsi,
            ma_short: TrailingMean::new(SHORT_MA_PERIOD)?,
            ma_long: TrailingMean::new(LONG_MA_PERIOD)?,
            volume_ratio: VolumeRatio,
            price_position: PricePosition,
            volatility: Volatility,
        })
    }

    pub fn compute(&self, series: &PriceSeries) -> Result<FeatureVector, Report<IndicatorError>> {
        validate_series(series)?;

        let current_price = series.points.last().map(|p| p.close).unwrap_or_default();

        Ok(FeatureVector {
            rsi: rounded(&self.rsi, series, PRICE_PLACES)?,
            ma_20: rounded(&self.ma_short, series, PRICE_PLACES)?,
            ma_50: rounded(&self.ma_long, series, PRICE_PLACES)?,
            volume_ratio: rounded(&self.volume_ratio, series, PRICE_PLACES)?,
            price_position: rounded(&self.price_position, series, PRICE_PLACES)?,
            current_price: round_to(current_price, PRICE_PLACES),
            volatility: rounded(&self.volatility, series, VOLATILITY_PLACES)?,
        })
    }
}

fn rounded(
    indicator: &dyn Indicator,
    series: &PriceSeries,
    places: i32,
) -> Result<f64, Report<IndicatorError>> {
    let value = indicator.calculate(series)?;
    tracing::trace!(indicator = indicator.name(), value, "indicator computed");
    Ok(round_to(value, places))
}

fn validate_series(series: &PriceSeries) -> Result<(), Report<IndicatorError>> {
    if series.is_empty() {
        bail!(IndicatorError::InsufficientData {
            required: 1,
            available: 0,
        });
    }
    if let Some(p) = series.points.iter().find(|p| !p.close.is_finite()) {
        bail!(IndicatorError::InvalidInput {
            reason: format!("{}: non-finite close {} at {}", series.ticker, p.close, p.timestamp),
        });
    }
    if let Some(p) = series
        .points
        .iter()
        .find(|p| !p.volume.is_finite() || p.volume < 0.0)
    {
        bail!(IndicatorError::InvalidInput {
            reason: format!("{}: invalid volume {} at {}", series.ticker, p.volume, p.timestamp),
        });
    }
    Ok(())
}
