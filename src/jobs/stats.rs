use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

/// One GROUP BY pass over active items; everything except reward_balance and
/// badges (owned by the milestone engine) is derived here.
#[derive(Debug, sqlx::FromRow)]
struct PublisherAgg {
    publisher_id: String,
    total_items: i64,
    verified_items: i64,
    best_rank: Option<i64>,
    avg_rank: Option<f64>,
    total_reviews: i64,
    avg_rating: Option<f64>,
    items_last_7d: i64,
    items_last_30d: i64,
    first_item_at: Option<i64>,
    last_item_at: Option<i64>,
}

/// Rebuild every publisher's aggregate row from the current items table.
/// Wholesale recomputation keeps the cache self-healing: a missed cycle or a
/// crashed run is fully corrected by the next one. Returns the number of
/// publishers updated.
pub async fn recompute_publisher_stats(pool: &SqlitePool, now: i64) -> Result<usize> {
    let week_ago = now - 7 * 86_400;
    let month_ago = now - 30 * 86_400;

    let aggs = sqlx::query_as::<_, PublisherAgg>(
        r#"
        SELECT
            publisher_id,
            COUNT(*) AS total_items,
            SUM(CASE WHEN verified = 1 THEN 1 ELSE 0 END) AS verified_items,
            MIN(sales_rank) AS best_rank,
            AVG(sales_rank) AS avg_rank,
            CAST(SUM(COALESCE(review_count, 0)) AS INTEGER) AS total_reviews,
            AVG(rating) AS avg_rating,
            SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END) AS items_last_7d,
            SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END) AS items_last_30d,
            MIN(created_at) AS first_item_at,
            MAX(created_at) AS last_item_at
        FROM items
        WHERE active = 1
        GROUP BY publisher_id
        "#,
    )
    .bind(week_ago)
    .bind(month_ago)
    .fetch_all(pool)
    .await?;

    for agg in &aggs {
        // reward_balance and badges are deliberately absent from the DO
        // UPDATE list so awards survive the recompute.
        sqlx::query(
            r#"
            INSERT INTO publisher_stats (
                publisher_id, total_items, verified_items, best_rank, avg_rank,
                total_reviews, avg_rating, items_last_7d, items_last_30d,
                first_item_at, last_item_at, reward_balance, badges, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, '[]', ?)
            ON CONFLICT(publisher_id) DO UPDATE SET
                total_items = excluded.total_items,
                verified_items = excluded.verified_items,
                best_rank = excluded.best_rank,
                avg_rank = excluded.avg_rank,
                total_reviews = excluded.total_reviews,
                avg_rating = excluded.avg_rating,
                items_last_7d = excluded.items_last_7d,
                items_last_30d = excluded.items_last_30d,
                first_item_at = excluded.first_item_at,
                last_item_at = excluded.last_item_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&agg.publisher_id)
        .bind(agg.total_items)
        .bind(agg.verified_items)
        .bind(agg.best_rank)
        .bind(agg.avg_rank)
        .bind(agg.total_reviews)
        .bind(agg.avg_rating)
        .bind(agg.items_last_7d)
        .bind(agg.items_last_30d)
        .bind(agg.first_item_at)
        .bind(agg.last_item_at)
        .bind(now)
        .execute(pool)
        .await?;
    }

    debug!(publishers = aggs.len(), "Publisher stats recomputed");
    Ok(aggs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::PublisherStatsRow;
    use crate::types::now_secs;

    async fn insert_item(
        pool: &SqlitePool,
        id: &str,
        publisher: &str,
        verified: i64,
        rank: Option<i64>,
        reviews: Option<i64>,
        rating: Option<f64>,
        created_at: i64,
    ) {
        sqlx::query(
            "INSERT INTO items (id, title, publisher_id, verified, active, sales_rank, review_count, rating, created_at)
             VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("Title {id}"))
        .bind(publisher)
        .bind(verified)
        .bind(rank)
        .bind(reviews)
        .bind(rating)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn stats_for(pool: &SqlitePool, publisher: &str) -> PublisherStatsRow {
        sqlx::query_as("SELECT * FROM publisher_stats WHERE publisher_id = ?")
            .bind(publisher)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn aggregates_are_derived_from_items() {
        let pool = db::test_pool().await;
        let now = now_secs();
        insert_item(&pool, "a", "pub1", 1, Some(500), Some(20), Some(4.0), now - 86_400).await;
        insert_item(&pool, "b", "pub1", 1, Some(2_000), Some(30), Some(5.0), now - 40 * 86_400).await;
        insert_item(&pool, "c", "pub1", 0, None, None, None, now - 10 * 86_400).await;

        recompute_publisher_stats(&pool, now).await.unwrap();

        let s = stats_for(&pool, "pub1").await;
        assert_eq!(s.total_items, 3);
        assert_eq!(s.verified_items, 2);
        assert_eq!(s.best_rank, Some(500));
        assert_eq!(s.total_reviews, 50);
        assert_eq!(s.avg_rating, Some(4.5));
        assert_eq!(s.items_last_7d, 1);
        assert_eq!(s.items_last_30d, 2);
        assert_eq!(s.first_item_at, Some(now - 40 * 86_400));
        assert_eq!(s.last_item_at, Some(now - 86_400));
    }

    #[tokio::test]
    async fn recompute_preserves_rewards_and_badges() {
        let pool = db::test_pool().await;
        let now = now_secs();
        insert_item(&pool, "a", "pub1", 1, Some(500), Some(20), Some(4.0), now).await;
        recompute_publisher_stats(&pool, now).await.unwrap();

        sqlx::query(
            "UPDATE publisher_stats SET reward_balance = 7.5, badges = '[\"first_verified\"]'
             WHERE publisher_id = 'pub1'",
        )
        .execute(&pool)
        .await
        .unwrap();

        recompute_publisher_stats(&pool, now).await.unwrap();
        let s = stats_for(&pool, "pub1").await;
        assert_eq!(s.reward_balance, 7.5);
        assert_eq!(s.badges, "[\"first_verified\"]");
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let pool = db::test_pool().await;
        let now = now_secs();
        insert_item(&pool, "a", "pub1", 1, Some(500), Some(20), Some(4.0), now).await;

        recompute_publisher_stats(&pool, now).await.unwrap();
        let first = stats_for(&pool, "pub1").await;
        recompute_publisher_stats(&pool, now).await.unwrap();
        let second = stats_for(&pool, "pub1").await;

        assert_eq!(first.total_items, second.total_items);
        assert_eq!(first.best_rank, second.best_rank);
        assert_eq!(first.total_reviews, second.total_reviews);
    }
}
