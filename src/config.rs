use crate::error::{AppError, Result};
use crate::types::BadgeCategory;

pub const PROVIDER_API_URL: &str = "https://metrics.salespulse.dev";
pub const MAIL_API_URL: &str = "https://mail.salespulse.dev/send";

/// Metrics refresh interval (seconds) — how often the full catalog is re-fetched.
pub const REFRESH_INTERVAL_SECS: u64 = 21_600;

/// Leaderboard + badge recompute interval (seconds).
pub const LEADERBOARD_INTERVAL_SECS: u64 = 3_600;

/// Abandoned-order check interval (seconds).
pub const ABANDONMENT_INTERVAL_SECS: u64 = 1_800;

/// Delay between consecutive provider calls (milliseconds). The provider
/// rate-limits aggressively; items are fetched strictly sequentially.
pub const FETCH_DELAY_MS: u64 = 3_000;

/// Extra pause after a failed provider call before moving on (milliseconds).
pub const FAILURE_BACKOFF_MS: u64 = 1_000;

/// Per-call timeout for provider requests (seconds).
pub const PROVIDER_TIMEOUT_SECS: u64 = 15;

/// Per-call timeout for mail-service requests (seconds).
pub const MAIL_TIMEOUT_SECS: u64 = 10;

/// Orders younger than this are not considered abandoned yet (hours).
pub const ABANDONMENT_MIN_AGE_HOURS: u64 = 2;

/// Orders older than this are written off rather than chased (hours).
pub const ABANDONMENT_MAX_AGE_HOURS: u64 = 24;

/// How close (in items/reviews) a publisher must be to their next threshold
/// to show up in the proximity nudge report.
pub const PROXIMITY_NUDGE_DELTA: i64 = 2;

/// Rank-change magnitude below which movement counts as noise.
pub const RANK_STABLE_BAND: i64 = 1_000;

/// Rating-change magnitude below which movement counts as noise.
pub const RATING_STABLE_BAND: f64 = 0.1;

/// Trend score weights per directional signal. Rank dominates.
pub mod trend_weights {
    pub const RANK_UP: f64 = 30.0;
    pub const RANK_DOWN: f64 = -20.0;
    pub const RATING_UP: f64 = 15.0;
    pub const RATING_DOWN: f64 = -10.0;
    pub const REVIEWS_UP: f64 = 15.0;
    pub const REVIEWS_DOWN: f64 = -5.0;
}

// ---------------------------------------------------------------------------
// Badge table
// ---------------------------------------------------------------------------

/// One milestone definition: crossing `threshold` in `category` awards the
/// badge plus a free-credit reward of `reward_value`.
#[derive(Debug, Clone, Copy)]
pub struct BadgeDef {
    pub id: &'static str,
    pub category: BadgeCategory,
    pub threshold: i64,
    pub reward_value: f64,
}

pub const BADGE_DEFINITIONS: &[BadgeDef] = &[
    BadgeDef { id: "first_verified", category: BadgeCategory::VerifiedItems, threshold: 1, reward_value: 1.0 },
    BadgeDef { id: "five_verified", category: BadgeCategory::VerifiedItems, threshold: 5, reward_value: 2.5 },
    BadgeDef { id: "ten_verified", category: BadgeCategory::VerifiedItems, threshold: 10, reward_value: 5.0 },
    BadgeDef { id: "twentyfive_verified", category: BadgeCategory::VerifiedItems, threshold: 25, reward_value: 10.0 },
    BadgeDef { id: "fifty_verified", category: BadgeCategory::VerifiedItems, threshold: 50, reward_value: 25.0 },
    BadgeDef { id: "ten_reviews", category: BadgeCategory::TotalReviews, threshold: 10, reward_value: 1.0 },
    BadgeDef { id: "fifty_reviews", category: BadgeCategory::TotalReviews, threshold: 50, reward_value: 2.5 },
    BadgeDef { id: "hundred_reviews", category: BadgeCategory::TotalReviews, threshold: 100, reward_value: 5.0 },
    BadgeDef { id: "fivehundred_reviews", category: BadgeCategory::TotalReviews, threshold: 500, reward_value: 10.0 },
    // Rank badges cross downwards: a *lower* sales rank is better, so the
    // badge is earned when best_rank falls at or under the threshold.
    BadgeDef { id: "rank_top_10k", category: BadgeCategory::BestRank, threshold: 10_000, reward_value: 2.5 },
    BadgeDef { id: "rank_top_1k", category: BadgeCategory::BestRank, threshold: 1_000, reward_value: 5.0 },
    BadgeDef { id: "rank_top_100", category: BadgeCategory::BestRank, threshold: 100, reward_value: 25.0 },
];

// ---------------------------------------------------------------------------
// Leaderboard definitions
// ---------------------------------------------------------------------------

/// One leaderboard type: a filter over publisher_stats, a sort rule, and a
/// result cap. The SQL fragments are trusted compile-time constants, never
/// user input. `publisher_id ASC` is always appended as the tie-break so
/// rank assignment is stable across recomputes.
#[derive(Debug, Clone, Copy)]
pub struct LeaderboardSpec {
    pub name: &'static str,
    /// Expression selected as the ranked value.
    pub value_expr: &'static str,
    /// Expression selected as the informational secondary value.
    pub secondary_expr: &'static str,
    /// WHERE clause selecting qualifying publishers.
    pub filter: &'static str,
    /// ORDER BY clause (without the tie-break).
    pub order: &'static str,
    pub cap: i64,
}

pub const LEADERBOARD_TYPES: &[LeaderboardSpec] = &[
    LeaderboardSpec {
        name: "best_rank",
        value_expr: "best_rank",
        secondary_expr: "verified_items",
        // Minimum-activity filter keeps one-hit-wonder noise off the board.
        filter: "best_rank IS NOT NULL AND verified_items >= 3",
        order: "best_rank ASC",
        cap: 50,
    },
    LeaderboardSpec {
        name: "most_items",
        value_expr: "verified_items",
        secondary_expr: "total_reviews",
        filter: "verified_items >= 1",
        order: "verified_items DESC",
        cap: 100,
    },
    LeaderboardSpec {
        name: "most_reviews",
        value_expr: "total_reviews",
        secondary_expr: "avg_rating",
        filter: "total_reviews > 0",
        order: "total_reviews DESC",
        cap: 100,
    },
    LeaderboardSpec {
        name: "top_rated",
        value_expr: "avg_rating",
        secondary_expr: "total_reviews",
        filter: "avg_rating IS NOT NULL AND total_reviews >= 10",
        order: "avg_rating DESC",
        cap: 25,
    },
];

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub provider_api_url: String,
    pub mail_api_url: String,
    /// From-address used on recovery emails (MAIL_FROM).
    pub mail_from: String,
    pub refresh_interval_secs: u64,
    pub leaderboard_interval_secs: u64,
    pub abandonment_interval_secs: u64,
    pub fetch_delay_ms: u64,
    pub abandonment_min_age_hours: u64,
    pub abandonment_max_age_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let min_age = parse_env("ABANDONMENT_MIN_AGE_HOURS", ABANDONMENT_MIN_AGE_HOURS);
        let max_age = parse_env("ABANDONMENT_MAX_AGE_HOURS", ABANDONMENT_MAX_AGE_HOURS);
        if min_age >= max_age {
            return Err(AppError::Config(format!(
                "abandonment window is empty: min {min_age}h must be below max {max_age}h"
            )));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "salespulse.db".to_string()),
            provider_api_url: std::env::var("PROVIDER_API_URL")
                .unwrap_or_else(|_| PROVIDER_API_URL.to_string()),
            mail_api_url: std::env::var("MAIL_API_URL")
                .unwrap_or_else(|_| MAIL_API_URL.to_string()),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "orders@salespulse.dev".to_string()),
            refresh_interval_secs: parse_env("REFRESH_INTERVAL_SECS", REFRESH_INTERVAL_SECS),
            leaderboard_interval_secs: parse_env(
                "LEADERBOARD_INTERVAL_SECS",
                LEADERBOARD_INTERVAL_SECS,
            ),
            abandonment_interval_secs: parse_env(
                "ABANDONMENT_INTERVAL_SECS",
                ABANDONMENT_INTERVAL_SECS,
            ),
            fetch_delay_ms: parse_env("FETCH_DELAY_MS", FETCH_DELAY_MS),
            abandonment_min_age_hours: min_age,
            abandonment_max_age_hours: max_age,
        })
    }
}

fn parse_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
