use sqlx::SqlitePool;

use crate::error::Result;

/// Create every table if it does not exist yet. Idempotent — runs on every
/// startup (and on every test pool).
pub async fn init(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(
        r#"
        -- Catalog items under tracking. Owned by the catalog side of the
        -- application; this engine only updates the metric columns and
        -- last_fetched_at, and never deletes rows.
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            publisher_id TEXT NOT NULL,
            verified INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            sales_rank INTEGER,
            price REAL,
            rating REAL,
            rating_count INTEGER,
            review_count INTEGER,
            category TEXT,
            created_at INTEGER NOT NULL,
            last_fetched_at INTEGER
        );

        -- Append-only metric history; one row per successful refresh.
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT NOT NULL,
            sales_rank INTEGER,
            price REAL,
            rating REAL,
            rating_count INTEGER,
            review_count INTEGER,
            trend_direction TEXT NOT NULL,
            rank_delta INTEGER NOT NULL DEFAULT 0,
            recorded_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_item_recorded
            ON snapshots (item_id, recorded_at DESC);

        -- Derived per-publisher aggregates, recomputed wholesale each refresh
        -- cycle. reward_balance and badges are owned by the milestone engine
        -- and survive the recompute upsert.
        CREATE TABLE IF NOT EXISTS publisher_stats (
            publisher_id TEXT PRIMARY KEY,
            total_items INTEGER NOT NULL DEFAULT 0,
            verified_items INTEGER NOT NULL DEFAULT 0,
            best_rank INTEGER,
            avg_rank REAL,
            total_reviews INTEGER NOT NULL DEFAULT 0,
            avg_rating REAL,
            items_last_7d INTEGER NOT NULL DEFAULT 0,
            items_last_30d INTEGER NOT NULL DEFAULT 0,
            first_item_at INTEGER,
            last_item_at INTEGER,
            reward_balance REAL NOT NULL DEFAULT 0,
            badges TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL
        );

        -- Milestone state machine. achieved_at IS NULL = tracked but not yet
        -- crossed; the unique key is the exactly-once guard for awarding.
        CREATE TABLE IF NOT EXISTS milestones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publisher_id TEXT NOT NULL,
            category TEXT NOT NULL,
            threshold INTEGER NOT NULL,
            achieved_at INTEGER,
            value_at_award REAL,
            UNIQUE (publisher_id, category, threshold)
        );

        CREATE TABLE IF NOT EXISTS rewards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publisher_id TEXT NOT NULL,
            reward_type TEXT NOT NULL,
            value REAL NOT NULL,
            reason TEXT NOT NULL,
            earned_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'available'
        );

        -- Cached rankings. The full set for a type is replaced in one
        -- transaction so readers never see a half-built board.
        CREATE TABLE IF NOT EXISTS leaderboard_entries (
            leaderboard_type TEXT NOT NULL,
            publisher_id TEXT NOT NULL,
            rank INTEGER NOT NULL,
            value REAL NOT NULL,
            secondary_value REAL,
            badges TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (leaderboard_type, publisher_id)
        );

        -- Orders are owned by the storefront; this engine only reads them and
        -- stamps abandonment_email_sent_at.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            item_id TEXT NOT NULL,
            status TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            abandonment_email_sent_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status_created
            ON orders (status, created_at);

        -- Append-only job run log for operational dashboards.
        CREATE TABLE IF NOT EXISTS job_executions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name TEXT NOT NULL,
            success INTEGER NOT NULL,
            message TEXT NOT NULL,
            ran_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
