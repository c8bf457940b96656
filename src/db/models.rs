/// Database row types matching the schema in `db::schema`.
/// Used by sqlx for typed queries.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: String,
    pub title: String,
    pub publisher_id: String,
    pub verified: i64,
    pub active: i64,
    pub sales_rank: Option<i64>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub review_count: Option<i64>,
    pub category: Option<String>,
    pub created_at: i64,
    pub last_fetched_at: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub item_id: String,
    pub sales_rank: Option<i64>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub review_count: Option<i64>,
    pub trend_direction: String,
    pub rank_delta: i64,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublisherStatsRow {
    pub publisher_id: String,
    pub total_items: i64,
    pub verified_items: i64,
    pub best_rank: Option<i64>,
    pub avg_rank: Option<f64>,
    pub total_reviews: i64,
    pub avg_rating: Option<f64>,
    pub items_last_7d: i64,
    pub items_last_30d: i64,
    pub first_item_at: Option<i64>,
    pub last_item_at: Option<i64>,
    pub reward_balance: f64,
    /// JSON array of earned badge ids.
    pub badges: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MilestoneRow {
    pub id: i64,
    pub publisher_id: String,
    pub category: String,
    pub threshold: i64,
    pub achieved_at: Option<i64>,
    pub value_at_award: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RewardRow {
    pub id: i64,
    pub publisher_id: String,
    pub reward_type: String,
    pub value: f64,
    pub reason: String,
    pub earned_at: i64,
    pub status: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderboardEntryRow {
    pub leaderboard_type: String,
    pub publisher_id: String,
    pub rank: i64,
    pub value: f64,
    pub secondary_value: Option<f64>,
    pub badges: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobExecutionRow {
    pub id: i64,
    pub job_name: String,
    pub success: i64,
    pub message: String,
    pub ran_at: i64,
}
