use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::config::{BadgeDef, BADGE_DEFINITIONS};
use crate::db::models::PublisherStatsRow;
use crate::error::Result;
use crate::types::{now_secs, BadgeCategory};

/// Detects newly crossed thresholds and issues the badge, the reward row,
/// and the balance credit as one transaction. A milestone can only ever move
/// Unseen → tracked → achieved; achieved is terminal and never re-awarded.
pub struct MilestoneEngine {
    pool: SqlitePool,
}

/// Publisher close to their next uncrossed count-based threshold. Read-only
/// nudging data; producing it has no award side effects.
#[derive(Debug, Clone)]
pub struct ProximityReport {
    pub publisher_id: String,
    pub badge_id: &'static str,
    pub category: BadgeCategory,
    pub threshold: i64,
    pub current: i64,
    pub remaining: i64,
}

impl MilestoneEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One award sweep over every publisher and badge definition. Failures
    /// inside a single award transaction are isolated: that publisher stays
    /// unachieved and is retried next cycle.
    pub async fn run_once(&self) -> Result<String> {
        let now = now_secs();
        let stats = sqlx::query_as::<_, PublisherStatsRow>("SELECT * FROM publisher_stats")
            .fetch_all(&self.pool)
            .await?;
        let achieved = self.achieved_keys().await?;

        let mut awarded = 0usize;
        let mut failures = 0usize;
        for stat in &stats {
            for def in BADGE_DEFINITIONS {
                let Some(current) = current_value(stat, def.category) else {
                    continue;
                };
                if achieved.contains(&(
                    stat.publisher_id.clone(),
                    def.category.as_str().to_string(),
                    def.threshold,
                )) {
                    continue;
                }
                if crossed(def, current) {
                    match self.award(&stat.publisher_id, def, current, now).await {
                        Ok(true) => awarded += 1,
                        Ok(false) => {}
                        Err(e) => {
                            error!(
                                publisher_id = %stat.publisher_id,
                                badge = def.id,
                                "Award transaction failed, will retry next cycle: {e}"
                            );
                            failures += 1;
                        }
                    }
                } else if current > 0 {
                    self.track(&stat.publisher_id, def).await?;
                }
            }
        }

        Ok(format!(
            "awarded {awarded} badges across {} publishers, {failures} failed",
            stats.len()
        ))
    }

    /// Award one badge: milestone upsert, reward insert, and balance/badge
    /// credit, all-or-nothing. Returns false if the milestone turned out to
    /// be already achieved (re-checked inside the transaction).
    async fn award(
        &self,
        publisher_id: &str,
        def: &BadgeDef,
        current: i64,
        now: i64,
    ) -> Result<bool> {
        let category = def.category.as_str();
        let mut tx = self.pool.begin().await?;

        let existing: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT achieved_at FROM milestones
             WHERE publisher_id = ? AND category = ? AND threshold = ?",
        )
        .bind(publisher_id)
        .bind(category)
        .bind(def.threshold)
        .fetch_optional(&mut *tx)
        .await?;
        if matches!(existing, Some((Some(_),))) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO milestones (publisher_id, category, threshold, achieved_at, value_at_award)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(publisher_id, category, threshold) DO UPDATE SET
                achieved_at = excluded.achieved_at,
                value_at_award = excluded.value_at_award
            "#,
        )
        .bind(publisher_id)
        .bind(category)
        .bind(def.threshold)
        .bind(now)
        .bind(current as f64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO rewards (publisher_id, reward_type, value, reason, earned_at, status)
             VALUES (?, 'free_credit', ?, ?, ?, 'available')",
        )
        .bind(publisher_id)
        .bind(def.reward_value)
        .bind(format!("badge {}: {} threshold {}", def.id, category, def.threshold))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE publisher_stats
             SET reward_balance = reward_balance + ?, badges = json_insert(badges, '$[#]', ?)
             WHERE publisher_id = ?",
        )
        .bind(def.reward_value)
        .bind(def.id)
        .bind(publisher_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(publisher_id, badge = def.id, current, "Badge awarded");
        Ok(true)
    }

    /// Ensure an unachieved tracking row exists for a threshold the publisher
    /// has progress towards but has not crossed.
    async fn track(&self, publisher_id: &str, def: &BadgeDef) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO milestones (publisher_id, category, threshold)
             VALUES (?, ?, ?)",
        )
        .bind(publisher_id)
        .bind(def.category.as_str())
        .bind(def.threshold)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn achieved_keys(&self) -> Result<HashSet<(String, String, i64)>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT publisher_id, category, threshold FROM milestones WHERE achieved_at IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Publishers within `within` units of their next uncrossed count-based
    /// threshold. Rank thresholds are excluded — "almost top 100" is not a
    /// nudge anyone can act on.
    pub async fn proximity(&self, within: i64) -> Result<Vec<ProximityReport>> {
        let stats = sqlx::query_as::<_, PublisherStatsRow>("SELECT * FROM publisher_stats")
            .fetch_all(&self.pool)
            .await?;
        let achieved = self.achieved_keys().await?;

        let mut reports = Vec::new();
        for stat in &stats {
            for def in BADGE_DEFINITIONS {
                if !def.category.counts_up() {
                    continue;
                }
                if achieved.contains(&(
                    stat.publisher_id.clone(),
                    def.category.as_str().to_string(),
                    def.threshold,
                )) {
                    continue;
                }
                let Some(current) = current_value(stat, def.category) else {
                    continue;
                };
                let remaining = def.threshold - current;
                if remaining > 0 && remaining <= within {
                    reports.push(ProximityReport {
                        publisher_id: stat.publisher_id.clone(),
                        badge_id: def.id,
                        category: def.category,
                        threshold: def.threshold,
                        current,
                        remaining,
                    });
                }
            }
        }
        Ok(reports)
    }
}

/// The aggregate value a category is measured on; None when the publisher has
/// no reading for it (e.g. no ranked items yet).
fn current_value(stat: &PublisherStatsRow, category: BadgeCategory) -> Option<i64> {
    match category {
        BadgeCategory::VerifiedItems => Some(stat.verified_items),
        BadgeCategory::TotalReviews => Some(stat.total_reviews),
        BadgeCategory::BestRank => stat.best_rank,
    }
}

fn crossed(def: &BadgeDef, current: i64) -> bool {
    if def.category.counts_up() {
        current >= def.threshold
    } else {
        current <= def.threshold
    }
}
