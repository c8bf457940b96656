use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provider metrics
// ---------------------------------------------------------------------------

/// Current metrics for one tracked item as reported by the external provider.
/// Every field is optional — the provider's payload is best-effort and a
/// partially-populated response is still usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub sales_rank: Option<i64>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub review_count: Option<i64>,
    pub category: Option<String>,
}

impl Metrics {
    /// A fetch that produced none of rank/rating/price carries no signal and
    /// must not be recorded as a snapshot.
    pub fn has_signal(&self) -> bool {
        self.sales_rank.is_some() || self.rating.is_some() || self.price.is_some()
    }
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// First snapshot ever recorded for the item.
    New,
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::New => "new",
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Stable => "stable",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directional change between the previous snapshot and the current metrics.
/// `direction` is the headline signal (rank-driven; `New` when no history
/// exists) and is what gets stored on the snapshot row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    /// previous rank − current rank; positive means the item improved.
    pub rank_delta: i64,
    pub rating_direction: TrendDirection,
    pub rating_delta: f64,
    pub review_direction: TrendDirection,
    pub review_delta: i64,
    /// Composite score in [0, 100]; 50 is neutral.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

/// Aggregate dimension a badge threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    VerifiedItems,
    TotalReviews,
    /// Reverse direction: earned when best rank falls at or under the threshold.
    BestRank,
}

impl BadgeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeCategory::VerifiedItems => "verified_items",
            BadgeCategory::TotalReviews => "total_reviews",
            BadgeCategory::BestRank => "best_rank",
        }
    }

    /// Count-based categories cross upwards; rank crosses downwards.
    pub fn counts_up(self) -> bool {
        !matches!(self, BadgeCategory::BestRank)
    }
}

impl std::fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Unix epoch seconds. All persisted timestamps use this representation.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
