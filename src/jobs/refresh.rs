use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::models::{ItemRow, SnapshotRow};
use crate::error::Result;
use crate::jobs::stats;
use crate::provider::MetricsProvider;
use crate::trend::compute_trend;
use crate::types::{now_secs, Metrics};

/// Brings every active item's metrics up to date. Items are fetched strictly
/// sequentially with a fixed pause between provider calls — the provider
/// rate-limits, so parallelism is off the table.
pub struct RefreshJob {
    pool: SqlitePool,
    provider: Arc<dyn MetricsProvider>,
    fetch_delay: Duration,
    failure_backoff: Duration,
}

impl RefreshJob {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn MetricsProvider>,
        fetch_delay: Duration,
        failure_backoff: Duration,
    ) -> Self {
        Self { pool, provider, fetch_delay, failure_backoff }
    }

    /// One full refresh pass. Only the initial item-list load is fatal;
    /// per-item failures are logged, counted, and skipped.
    pub async fn run_once(&self) -> Result<String> {
        // Never-fetched items first (NULL sorts first in SQLite), then oldest.
        let items = sqlx::query_as::<_, ItemRow>(
            "SELECT * FROM items WHERE active = 1 ORDER BY last_fetched_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.fetch_delay).await;
            }
            match self.refresh_item(item).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!(item_id = %item.id, "Item refresh failed: {e}");
                    failed += 1;
                    tokio::time::sleep(self.failure_backoff).await;
                }
            }
        }

        let now = now_secs();
        let publishers = stats::recompute_publisher_stats(&self.pool, now).await?;

        Ok(format!(
            "refreshed {succeeded} items, {failed} failed, {publishers} publishers aggregated"
        ))
    }

    async fn refresh_item(&self, item: &ItemRow) -> Result<()> {
        let metrics = self.provider.fetch_metrics(&item.id).await?;
        let now = now_secs();

        sqlx::query(
            r#"
            UPDATE items SET
                sales_rank = ?, price = ?, rating = ?, rating_count = ?,
                review_count = ?, category = COALESCE(?, category),
                last_fetched_at = ?
            WHERE id = ?
            "#,
        )
        .bind(metrics.sales_rank)
        .bind(metrics.price)
        .bind(metrics.rating)
        .bind(metrics.rating_count)
        .bind(metrics.review_count)
        .bind(&metrics.category)
        .bind(now)
        .bind(&item.id)
        .execute(&self.pool)
        .await?;

        // A fetch with no rank, rating, or price carries nothing worth
        // keeping in the history.
        if !metrics.has_signal() {
            debug!(item_id = %item.id, "Empty fetch, no snapshot recorded");
            return Ok(());
        }

        let previous = sqlx::query_as::<_, SnapshotRow>(
            "SELECT * FROM snapshots WHERE item_id = ? ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(&item.id)
        .fetch_optional(&self.pool)
        .await?;

        let trend = compute_trend(previous.as_ref(), &metrics);
        self.append_snapshot(&item.id, &metrics, trend.direction.as_str(), trend.rank_delta, now)
            .await?;

        debug!(
            item_id = %item.id,
            direction = %trend.direction,
            rank_delta = trend.rank_delta,
            score = trend.score,
            "Snapshot recorded"
        );
        Ok(())
    }

    async fn append_snapshot(
        &self,
        item_id: &str,
        m: &Metrics,
        direction: &str,
        rank_delta: i64,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (
                item_id, sales_rank, price, rating, rating_count, review_count,
                trend_direction, rank_delta, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(m.sales_rank)
        .bind(m.price)
        .bind(m.rating)
        .bind(m.rating_count)
        .bind(m.review_count)
        .bind(direction)
        .bind(rank_delta)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
