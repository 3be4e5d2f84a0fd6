use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_points};
use crate::model::PriceSeries;

/// Mean of the last `period` closes, or of every close when fewer exist.
pub struct TrailingMean {
    period: usize,
    name: String,
}

impl TrailingMean {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidInput {
                reason: "period must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            name: format!("ma_{period}"),
        })
    }

    /// Calculate the trailing mean from a price slice (internal helper).
    pub fn calculate_prices(&self, prices: &[f64]) -> f64 {
        let window = &prices[prices.len().saturating_sub(self.period)..];
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64
    }
}

impl Indicator for TrailingMean {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_points(&self) -> usize {
        1
    }

    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>> {
        ensure_points(self, series)?;
        Ok(self.calculate_prices(&series.closes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::series_from_closes;

    #[test]
    fn period_zero_invalid() {
        assert!(TrailingMean::new(0).is_err());
    }

    #[test]
    fn name_includes_period() {
        assert_eq!(TrailingMean::new(20).unwrap().name(), "ma_20");
    }

    #[test]
    fn uses_only_last_period_closes() {
        let ma = TrailingMean::new(3).unwrap();
        let value = ma.calculate(&series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        // (3+4+5)/3
        assert!((value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_all_closes_when_short() {
        let ma = TrailingMean::new(50).unwrap();
        let value = ma.calculate(&series_from_closes(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert!((value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn exact_period_uses_every_close() {
        let ma = TrailingMean::new(4).unwrap();
        let value = ma.calculate(&series_from_closes(&[2.0, 4.0, 6.0, 8.0])).unwrap();
        assert!((value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_is_error() {
        let ma = TrailingMean::new(20).unwrap();
        assert!(ma.calculate(&series_from_closes(&[])).is_err());
    }
}
