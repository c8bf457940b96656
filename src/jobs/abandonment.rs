use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mailer::Mailer;
use crate::types::now_secs;

/// One pending order eligible for a recovery email, joined with its item.
#[derive(Debug, sqlx::FromRow)]
struct AbandonedOrder {
    id: String,
    customer_email: String,
    item_title: String,
    amount: f64,
}

/// Chases orders that sat in "pending" inside the configured window without
/// a completed purchase of the same item by the same customer. Each order is
/// contacted at most once: the sent-at stamp is the dedup guard, written only
/// after the mail service confirms delivery. A crash between the send and the
/// stamp can duplicate a single email — preferred over silently missing one.
pub struct AbandonmentJob {
    pool: SqlitePool,
    mailer: Arc<dyn Mailer>,
    min_age: Duration,
    max_age: Duration,
}

impl AbandonmentJob {
    pub fn new(
        pool: SqlitePool,
        mailer: Arc<dyn Mailer>,
        min_age: Duration,
        max_age: Duration,
    ) -> Self {
        Self { pool, mailer, min_age, max_age }
    }

    pub async fn run_once(&self) -> Result<String> {
        let now = now_secs();
        let newest = now - self.min_age.as_secs() as i64;
        let oldest = now - self.max_age.as_secs() as i64;

        let candidates = sqlx::query_as::<_, AbandonedOrder>(
            r#"
            SELECT o.id, o.customer_email, o.amount, i.title AS item_title
            FROM orders o
            JOIN items i ON i.id = o.item_id
            WHERE o.status = 'pending'
              AND o.created_at BETWEEN ? AND ?
              AND o.abandonment_email_sent_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM orders c
                  WHERE c.customer_id = o.customer_id
                    AND c.item_id = o.item_id
                    AND c.status = 'completed'
              )
            ORDER BY o.created_at ASC
            "#,
        )
        .bind(oldest)
        .bind(newest)
        .fetch_all(&self.pool)
        .await?;

        let mut sent = 0usize;
        let mut failed = 0usize;
        for order in &candidates {
            match self.recover(order).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(order_id = %order.id, "Recovery email failed: {e}");
                    failed += 1;
                }
            }
        }

        Ok(format!(
            "{} abandoned orders found, {sent} emails sent, {failed} failed",
            candidates.len()
        ))
    }

    async fn recover(&self, order: &AbandonedOrder) -> Result<()> {
        let subject = format!("Still thinking about \"{}\"?", order.item_title);
        let text = format!(
            "Your order for \"{}\" (${:.2}) is still waiting. Complete your \
             purchase any time — we kept your cart exactly as you left it.",
            order.item_title, order.amount
        );
        let html = format!(
            "<p>Your order for <strong>{}</strong> (${:.2}) is still waiting.</p>\
             <p>Complete your purchase any time — we kept your cart exactly as you left it.</p>",
            order.item_title, order.amount
        );

        self.mailer.send(&order.customer_email, &subject, &html, &text).await?;

        // Stamped only after a confirmed send; this is what keeps the next
        // run from selecting the order again.
        sqlx::query("UPDATE orders SET abandonment_email_sent_at = ? WHERE id = ?")
            .bind(now_secs())
            .bind(&order.id)
            .execute(&self.pool)
            .await?;

        debug!(order_id = %order.id, "Recovery email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mailer fake: records sends, optionally fails specific recipients.
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Mutex<Vec<String>>,
    }

    impl RecordingMailer {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()), fail_for: Mutex::new(Vec::new()) }
        }

        fn fail_for(&self, to: &str) {
            self.fail_for.lock().unwrap().push(to.to_string());
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: &str, _text: &str) -> Result<()> {
            if self.fail_for.lock().unwrap().iter().any(|f| f == to) {
                return Err(AppError::Mail(format!("mail service rejected {to}")));
            }
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    async fn insert_item(pool: &SqlitePool, id: &str, title: &str) {
        sqlx::query(
            "INSERT INTO items (id, title, publisher_id, created_at) VALUES (?, ?, 'pub1', 0)",
        )
        .bind(id)
        .bind(title)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_order(
        pool: &SqlitePool,
        id: &str,
        customer: &str,
        item: &str,
        status: &str,
        age_secs: i64,
    ) {
        sqlx::query(
            "INSERT INTO orders (id, customer_id, customer_email, item_id, status, amount, created_at)
             VALUES (?, ?, ?, ?, ?, 19.99, ?)",
        )
        .bind(id)
        .bind(customer)
        .bind(format!("{customer}@example.com"))
        .bind(item)
        .bind(status)
        .bind(now_secs() - age_secs)
        .execute(pool)
        .await
        .unwrap();
    }

    fn job(pool: &SqlitePool, mailer: Arc<RecordingMailer>) -> AbandonmentJob {
        AbandonmentJob::new(
            pool.clone(),
            mailer,
            Duration::from_secs(2 * 3_600),
            Duration::from_secs(24 * 3_600),
        )
    }

    #[tokio::test]
    async fn only_orders_inside_the_window_are_selected() {
        let pool = db::test_pool().await;
        insert_item(&pool, "book1", "The Long Tail").await;
        insert_order(&pool, "too_fresh", "c1", "book1", "pending", 3_600).await;
        insert_order(&pool, "in_window", "c2", "book1", "pending", 5 * 3_600).await;
        insert_order(&pool, "too_old", "c3", "book1", "pending", 48 * 3_600).await;
        insert_order(&pool, "completed", "c4", "book1", "completed", 5 * 3_600).await;

        let mailer = Arc::new(RecordingMailer::new());
        let summary = job(&pool, Arc::clone(&mailer)).run_once().await.unwrap();
        assert!(summary.contains("1 abandoned orders found"), "summary: {summary}");

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "c2@example.com");
        assert!(sent[0].1.contains("The Long Tail"));
    }

    #[tokio::test]
    async fn contacted_orders_are_never_reselected() {
        let pool = db::test_pool().await;
        insert_item(&pool, "book1", "The Long Tail").await;
        insert_order(&pool, "o1", "c1", "book1", "pending", 5 * 3_600).await;

        let mailer = Arc::new(RecordingMailer::new());
        let recovery = job(&pool, Arc::clone(&mailer));
        recovery.run_once().await.unwrap();
        assert_eq!(mailer.sent().len(), 1);

        // Still pending, still inside the window — but already contacted.
        recovery.run_once().await.unwrap();
        assert_eq!(mailer.sent().len(), 1, "dedup guard must hold");
    }

    #[tokio::test]
    async fn completed_purchase_of_same_item_suppresses_recovery() {
        let pool = db::test_pool().await;
        insert_item(&pool, "book1", "The Long Tail").await;
        insert_order(&pool, "o1", "c1", "book1", "pending", 5 * 3_600).await;
        // The customer already bought the item through another order.
        insert_order(&pool, "o2", "c1", "book1", "completed", 3 * 3_600).await;

        let mailer = Arc::new(RecordingMailer::new());
        job(&pool, Arc::clone(&mailer)).run_once().await.unwrap();
        assert_eq!(mailer.sent().len(), 0);
    }

    #[tokio::test]
    async fn send_failure_leaves_order_eligible_for_retry() {
        let pool = db::test_pool().await;
        insert_item(&pool, "book1", "The Long Tail").await;
        insert_order(&pool, "flaky", "c1", "book1", "pending", 5 * 3_600).await;
        insert_order(&pool, "fine", "c2", "book1", "pending", 6 * 3_600).await;

        let mailer = Arc::new(RecordingMailer::new());
        mailer.fail_for("c1@example.com");
        let recovery = job(&pool, Arc::clone(&mailer));

        let summary = recovery.run_once().await.unwrap();
        assert!(summary.contains("1 emails sent, 1 failed"), "summary: {summary}");

        let stamped: Option<i64> = sqlx::query_scalar(
            "SELECT abandonment_email_sent_at FROM orders WHERE id = 'flaky'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(stamped.is_none(), "failed send must not set the dedup stamp");

        // Mail service recovers; the flaky order is picked up next cycle.
        mailer.fail_for.lock().unwrap().clear();
        recovery.run_once().await.unwrap();
        assert_eq!(mailer.sent().len(), 2);
    }
}
