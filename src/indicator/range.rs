use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_points};
use crate::model::PriceSeries;

/// Position of a flat window, where the range collapses to a single price.
const FLAT_RANGE_POSITION: f64 = 0.5;

/// Where the last close sits within the window's min..max close range, in [0, 1].
pub struct PricePosition;

impl Indicator for PricePosition {
    fn name(&self) -> &str {
        "price_position"
    }

    fn required_points(&self) -> usize {
        1
    }

    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>> {
        ensure_points(self, series)?;

        let prices = series.closes();
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let last = prices.last().copied().unwrap_or_default();

        let span = max - min;
        if span <= 0.0 {
            return Ok(FLAT_RANGE_POSITION);
        }
        Ok((last - min) / span)
    }
}
