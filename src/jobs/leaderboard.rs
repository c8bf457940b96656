use sqlx::SqlitePool;
use tracing::debug;

use crate::config::{LeaderboardSpec, LEADERBOARD_TYPES};
use crate::error::Result;
use crate::types::now_secs;

/// Qualifying publisher for one leaderboard type, in final sort order.
#[derive(Debug, sqlx::FromRow)]
struct Candidate {
    publisher_id: String,
    value: f64,
    secondary_value: Option<f64>,
    badges: String,
}

/// Recomputes every leaderboard type from publisher_stats and atomically
/// replaces the cached rows. Badge lists are snapshotted onto entries as-is;
/// they may lag the milestone engine by at most one cycle.
pub struct LeaderboardEngine {
    pool: SqlitePool,
}

impl LeaderboardEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_once(&self) -> Result<String> {
        let now = now_secs();
        let mut total_entries = 0usize;
        for spec in LEADERBOARD_TYPES {
            total_entries += self.rebuild(spec, now).await?;
        }
        Ok(format!(
            "rebuilt {} leaderboards, {total_entries} entries",
            LEADERBOARD_TYPES.len()
        ))
    }

    /// Query the qualifying set in ranked order, then swap it in under one
    /// transaction. Readers see the old board or the new board, never a mix.
    async fn rebuild(&self, spec: &LeaderboardSpec, now: i64) -> Result<usize> {
        // The SQL fragments come from the static LEADERBOARD_TYPES table.
        // publisher_id is the stable tie-break so reruns over the same stats
        // assign identical ranks.
        let sql = format!(
            "SELECT publisher_id, CAST({value} AS REAL) AS value, \
             CAST({secondary} AS REAL) AS secondary_value, badges \
             FROM publisher_stats WHERE {filter} \
             ORDER BY {order}, publisher_id ASC LIMIT {cap}",
            value = spec.value_expr,
            secondary = spec.secondary_expr,
            filter = spec.filter,
            order = spec.order,
            cap = spec.cap,
        );
        let candidates = sqlx::query_as::<_, Candidate>(&sql).fetch_all(&self.pool).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM leaderboard_entries WHERE leaderboard_type = ?")
            .bind(spec.name)
            .execute(&mut *tx)
            .await?;
        for (i, c) in candidates.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO leaderboard_entries (
                    leaderboard_type, publisher_id, rank, value,
                    secondary_value, badges, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(spec.name)
            .bind(&c.publisher_id)
            .bind((i + 1) as i64)
            .bind(c.value)
            .bind(c.secondary_value)
            .bind(&c.badges)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(leaderboard = spec.name, entries = candidates.len(), "Leaderboard rebuilt");
        Ok(candidates.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::LeaderboardEntryRow;

    async fn insert_stats(
        pool: &SqlitePool,
        publisher: &str,
        verified: i64,
        best_rank: Option<i64>,
        reviews: i64,
        rating: Option<f64>,
        badges: &str,
    ) {
        sqlx::query(
            "INSERT INTO publisher_stats (publisher_id, total_items, verified_items, best_rank,
                 total_reviews, avg_rating, badges, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(publisher)
        .bind(verified)
        .bind(verified)
        .bind(best_rank)
        .bind(reviews)
        .bind(rating)
        .bind(badges)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn entries(pool: &SqlitePool, board: &str) -> Vec<LeaderboardEntryRow> {
        sqlx::query_as(
            "SELECT * FROM leaderboard_entries WHERE leaderboard_type = ? ORDER BY rank ASC",
        )
        .bind(board)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn best_rank_requires_minimum_activity() {
        let pool = db::test_pool().await;
        insert_stats(&pool, "serious", 5, Some(200), 0, None, "[]").await;
        insert_stats(&pool, "dabbler", 2, Some(10), 0, None, "[]").await;

        LeaderboardEngine::new(pool.clone()).run_once().await.unwrap();

        let rows = entries(&pool, "best_rank").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].publisher_id, "serious");
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].value, 200.0);
    }

    #[tokio::test]
    async fn ranks_are_dense_and_tie_break_is_stable() {
        let pool = db::test_pool().await;
        insert_stats(&pool, "zeta", 10, None, 40, None, "[]").await;
        insert_stats(&pool, "alpha", 10, None, 40, None, "[]").await;
        insert_stats(&pool, "mid", 7, None, 40, None, "[]").await;

        LeaderboardEngine::new(pool.clone()).run_once().await.unwrap();

        let rows = entries(&pool, "most_items").await;
        assert_eq!(rows.len(), 3);
        // Equal verified counts: publisher_id ascending breaks the tie.
        assert_eq!(rows[0].publisher_id, "alpha");
        assert_eq!(rows[1].publisher_id, "zeta");
        assert_eq!(rows[2].publisher_id, "mid");
        assert_eq!(
            rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn recompute_is_deterministic() {
        let pool = db::test_pool().await;
        insert_stats(&pool, "a", 4, Some(900), 25, Some(4.1), "[]").await;
        insert_stats(&pool, "b", 6, Some(100), 75, Some(4.9), "[]").await;

        let engine = LeaderboardEngine::new(pool.clone());
        engine.run_once().await.unwrap();
        let first = entries(&pool, "most_reviews").await;
        engine.run_once().await.unwrap();
        let second = entries(&pool, "most_reviews").await;

        assert_eq!(first.len(), second.len());
        for (f, s) in first.iter().zip(&second) {
            assert_eq!(f.publisher_id, s.publisher_id);
            assert_eq!(f.rank, s.rank);
            assert_eq!(f.value, s.value);
        }
    }

    #[tokio::test]
    async fn stale_entries_are_fully_replaced() {
        let pool = db::test_pool().await;
        insert_stats(&pool, "gone", 3, None, 10, None, "[]").await;
        insert_stats(&pool, "stays", 5, None, 10, None, "[]").await;

        let engine = LeaderboardEngine::new(pool.clone());
        engine.run_once().await.unwrap();
        assert_eq!(entries(&pool, "most_items").await.len(), 2);

        // Publisher "gone" loses all verified items and must drop off.
        sqlx::query("UPDATE publisher_stats SET verified_items = 0 WHERE publisher_id = 'gone'")
            .execute(&pool)
            .await
            .unwrap();
        engine.run_once().await.unwrap();

        let rows = entries(&pool, "most_items").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].publisher_id, "stays");
        assert_eq!(rows[0].rank, 1);
    }

    #[tokio::test]
    async fn badges_are_snapshotted_onto_entries() {
        let pool = db::test_pool().await;
        insert_stats(&pool, "decorated", 4, None, 20, Some(4.5), "[\"ten_reviews\"]").await;

        LeaderboardEngine::new(pool.clone()).run_once().await.unwrap();

        let rows = entries(&pool, "top_rated").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].badges, "[\"ten_reviews\"]");
        assert_eq!(rows[0].value, 4.5);
        assert_eq!(rows[0].secondary_value, Some(20.0));
    }
}
