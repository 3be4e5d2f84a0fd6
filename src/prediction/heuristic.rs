use crate::config::HeuristicConfig;
use crate::model::{Direction, FeatureVector, PredictionOutcome, Timeframe, round_to};
use crate::prediction::scoring::ScoringStrategy;

const BASE_PROBABILITY: f64 = 0.5;
const MIN_PROBABILITY: f64 = 0.1;
const MAX_PROBABILITY: f64 = 0.9;
const PROBABILITY_PLACES: i32 = 3;
const PRICE_PLACES: i32 = 2;
/// Target distance in multiples of volatility; the stop sits one unit away.
const TARGET_MULTIPLE: f64 = 2.0;

/// Rule-based probability before the scoring strategy's delta and clamping.
pub fn base_score(features: &FeatureVector, config: &HeuristicConfig) -> f64 {
    let mut score = BASE_PROBABILITY;

    if features.rsi < config.oversold {
        score += config.rsi_weight;
    } else if features.rsi > config.overbought {
        score -= config.rsi_weight;
    }

    if features.price_position < config.low_band {
        score += config.position_weight;
    } else if features.price_position > config.high_band {
        score -= config.position_weight;
    }

    if features.volume_ratio > config.volume_surge {
        score += config.volume_weight;
    }

    score
}

/// Map features to a directional call.
///
/// Direction and confidence derive from the rounded probability, so the
/// stored values satisfy `up iff probability > 0.5` exactly.
pub fn generate(
    features: &FeatureVector,
    timeframe: Timeframe,
    config: &HeuristicConfig,
    scoring: &dyn ScoringStrategy,
) -> PredictionOutcome {
    let base = base_score(features, config);
    let delta = scoring.score(features);
    let probability = round_to(
        (base + delta).clamp(MIN_PROBABILITY, MAX_PROBABILITY),
        PROBABILITY_PLACES,
    );

    let direction = if probability > BASE_PROBABILITY {
        Direction::Up
    } else {
        Direction::Down
    };
    let confidence = round_to(
        (probability - BASE_PROBABILITY).abs() * 2.0,
        PROBABILITY_PLACES,
    );
    let (target_price, stop_loss) =
        price_targets(direction, features.current_price, features.volatility);

    tracing::debug!(
        timeframe = %timeframe,
        strategy = scoring.name(),
        base,
        delta,
        probability,
        "heuristic scored"
    );

    PredictionOutcome {
        direction,
        probability,
        confidence,
        target_price,
        stop_loss,
    }
}

/// Target and stop-loss around `current_price`, scaled by `volatility`.
pub fn price_targets(direction: Direction, current_price: f64, volatility: f64) -> (f64, f64) {
    let (target, stop) = match direction {
        Direction::Up => (
            current_price * (1.0 + TARGET_MULTIPLE * volatility),
            current_price * (1.0 - volatility),
        ),
        Direction::Down => (
            current_price * (1.0 - TARGET_MULTIPLE * volatility),
            current_price * (1.0 + volatility),
        ),
    };
    (round_to(target, PRICE_PLACES), round_to(stop, PRICE_PLACES))
}
