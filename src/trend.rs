use crate::config::{trend_weights, RANK_STABLE_BAND, RATING_STABLE_BAND};
use crate::db::models::SnapshotRow;
use crate::types::{Metrics, Trend, TrendDirection};

/// Characterize the change between the most recent prior snapshot and the
/// freshly fetched metrics. Pure and deterministic — identical inputs always
/// produce identical output.
///
/// Deltas are oriented so positive means improvement: rank is
/// `previous − current` (lower rank is better), rating and reviews are
/// `current − previous`.
pub fn compute_trend(previous: Option<&SnapshotRow>, current: &Metrics) -> Trend {
    let Some(prev) = previous else {
        return Trend {
            direction: TrendDirection::New,
            rank_delta: 0,
            rating_direction: TrendDirection::Stable,
            rating_delta: 0.0,
            review_direction: TrendDirection::Stable,
            review_delta: 0,
            score: 50.0,
        };
    };

    let rank_delta = match (prev.sales_rank, current.sales_rank) {
        (Some(p), Some(c)) => p - c,
        _ => 0,
    };
    let rank_direction = if rank_delta > RANK_STABLE_BAND {
        TrendDirection::Up
    } else if rank_delta < -RANK_STABLE_BAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    let rating_delta = match (prev.rating, current.rating) {
        (Some(p), Some(c)) => round2(c - p),
        _ => 0.0,
    };
    let rating_direction = if rating_delta > RATING_STABLE_BAND {
        TrendDirection::Up
    } else if rating_delta < -RATING_STABLE_BAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    let review_delta = match (prev.review_count, current.review_count) {
        (Some(p), Some(c)) => c - p,
        _ => 0,
    };
    let review_direction = if review_delta > 5 {
        TrendDirection::Up
    } else if review_delta < -2 {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    let mut score = 50.0;
    score += match rank_direction {
        TrendDirection::Up => trend_weights::RANK_UP,
        TrendDirection::Down => trend_weights::RANK_DOWN,
        _ => 0.0,
    };
    score += match rating_direction {
        TrendDirection::Up => trend_weights::RATING_UP,
        TrendDirection::Down => trend_weights::RATING_DOWN,
        _ => 0.0,
    };
    score += match review_direction {
        TrendDirection::Up => trend_weights::REVIEWS_UP,
        TrendDirection::Down => trend_weights::REVIEWS_DOWN,
        _ => 0.0,
    };

    Trend {
        direction: rank_direction,
        rank_delta,
        rating_direction,
        rating_delta,
        review_direction,
        review_delta,
        score: score.clamp(0.0, 100.0),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
