use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_points};
use crate::model::PriceSeries;

/// Most recent volume relative to the mean volume of the window.
///
/// Reads 1 when the mean volume is zero.
pub struct VolumeRatio;

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        "volume_ratio"
    }

    fn required_points(&self) -> usize {
        1
    }

    fn calculate(&self, series: &PriceSeries) -> Result<f64, Report<IndicatorError>> {
        ensure_points(self, series)?;

        let vols = series.volumes();
        let mean = vols.iter().sum::<f64>() / vols.len() as f64;
        let last = vols.last().copied().unwrap_or_default();

        if mean > 0.0 {
            Ok(last / mean)
        } else {
            Ok(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::series;

    #[test]
    fn known_value() {
        // mean = (1+1+1+5)/4 = 2
        let value = VolumeRatio
            .calculate(&series(&[1.0; 4], &[1.0, 1.0, 1.0, 5.0]))
            .unwrap();
        assert!((value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn zero_volume_window_reads_one() {
        let value = VolumeRatio
            .calculate(&series(&[1.0; 3], &[0.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn quiet_last_bar_is_below_one() {
        let value = VolumeRatio
            .calculate(&series(&[1.0; 3], &[10.0, 10.0, 1.0]))
            .unwrap();
        assert!(value < 1.0);
    }

    #[test]
    fn empty_series_is_error() {
        assert!(VolumeRatio.calculate(&series(&[], &[])).is_err());
    }
}
