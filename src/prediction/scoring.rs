use rand::Rng;

use crate::config::HeuristicConfig;
use crate::model::FeatureVector;

/// Adjustment added to the heuristic's rule-based probability.
///
/// This is the seam for a real model: an implementation sees the same
/// features as the rules and returns a signed delta.
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, features: &FeatureVector) -> f64;
}

/// Uniform random perturbation in `[-amplitude, +amplitude]`.
#[derive(Debug, Clone)]
pub struct UniformJitter {
    amplitude: f64,
}

impl UniformJitter {
    pub fn new(amplitude: f64) -> Self {
        Self {
            amplitude: amplitude.abs(),
        }
    }
}

impl ScoringStrategy for UniformJitter {
    fn name(&self) -> &str {
        "uniform_jitter"
    }

    fn score(&self, _features: &FeatureVector) -> f64 {
        if self.amplitude == 0.0 {
            return 0.0;
        }
        rand::rng().random_range(-self.amplitude..=self.amplitude)
    }
}

/// Constant delta, independent of the features.
#[derive(Debug, Clone, Copy)]
pub struct FixedScore(pub f64);

impl ScoringStrategy for FixedScore {
    fn name(&self) -> &str {
        "fixed"
    }

    fn score(&self, _features: &FeatureVector) -> f64 {
        self.0
    }
}

/// Build the scoring strategy selected by `config`.
///
/// A zero jitter makes predictions fully deterministic.
pub fn build_scoring(config: &HeuristicConfig) -> Box<dyn ScoringStrategy> {
    if config.jitter == 0.0 {
        Box::new(FixedScore(0.0))
    } else {
        Box::new(UniformJitter::new(config.jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureVector {
        FeatureVector {
            rsi: 50.0,
            ma_20: 100.0,
            ma_50: 100.0,
            volume_ratio: 1.0,
            price_position: 0.5,
            current_price: 100.0,
            volatility: 0.02,
        }
    }

    #[test]
    fn jitter_stays_within_amplitude() {
        let jitter = UniformJitter::new(0.05);
        for _ in 0..1000 {
            let delta = jitter.score(&features());
            assert!((-0.05..=0.05).contains(&delta), "delta {delta} out of range");
        }
    }

    #[test]
    fn zero_amplitude_jitter_is_silent() {
        assert_eq!(UniformJitter::new(0.0).score(&features()), 0.0);
    }

    #[test]
    fn fixed_score_is_constant() {
        let fixed = FixedScore(0.03);
        assert_eq!(fixed.score(&features()), 0.03);
        assert_eq!(fixed.score(&features()), 0.03);
    }

    #[test]
    fn build_selects_by_jitter() {
        let default = build_scoring(&HeuristicConfig::default());
        assert_eq!(default.name(), "uniform_jitter");

        let deterministic = build_scoring(&HeuristicConfig {
            jitter: 0.0,
            ..HeuristicConfig::default()
        });
        assert_eq!(deterministic.name(), "fixed");
        assert_eq!(deterministic.score(&features()), 0.0);
    }
}
