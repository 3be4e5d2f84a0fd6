use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_points};
use crate::model::PriceSeries;

/// Population standard deviation of period-to-period close changes.
///
/// Measured in price units, not returns. Zero with fewer than two points.
pub struct Volatility;

impl Indicator for Volatility {
    fn name(&self) -> &str {
        "volatility"
    }

    fn required_points(&self) -> usize {
        1
    }

    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>> {
        ensure_points(self, series)?;

        let deltas: Vec<f64> = series.closes().windows(2).map(|w| w[1] - w[0]).collect();
        if deltas.is_empty() {
            return Ok(0.0);
        }

        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        Ok(variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::series_from_closes;

    #[test]
    fn single_point_is_zero() {
        let value = Volatility.calculate(&series_from_closes(&[5.0])).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn linear_series_is_zero() {
        // constant step of +2 has no dispersion
        let value = Volatility
            .calculate(&series_from_closes(&[1.0, 3.0, 5.0, 7.0]))
            .unwrap();
        assert!(value.abs() < 1e-12);
    }

    #[test]
    fn known_value() {
        // deltas: +1, -1 -> mean 0, variance 1
        let value = Volatility
            .calculate(&series_from_closes(&[10.0, 11.0, 10.0]))
            .unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }
}
