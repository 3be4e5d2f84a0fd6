use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_points};
use crate::model::PriceSeries;

/// RSI-style momentum oscillator over the whole window.
///
/// Gains and losses are summed across every period-to-period change rather
/// than smoothed. With no losses the relative strength is taken as 1, so a
/// strictly rising or flat window reads 50.
pub struct Rsi;

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_points(&self) -> usize {
        1
    }

    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>> {
        ensure_points(self, series)?;

        let prices = series.closes();
        let deltas = prices.windows(2).map(|w| w[1] - w[0]);

        let (gains, losses) = deltas.fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

        Ok(rsi_value(gains, losses))
    }
}

fn rsi_value(gains: f64, losses: f64) -> f64 {
    let rs = if losses > 0.0 { gains / losses } else { 1.0 };
    100.0 - 100.0 / (1.0 + rs)
}
