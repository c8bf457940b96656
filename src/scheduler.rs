use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::db::models::JobExecutionRow;
use crate::error::Result;
use crate::types::now_secs;

/// Outcome of one trigger of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { success: bool },
    /// A previous invocation was still running; this trigger did nothing.
    Skipped,
}

/// Drives recurring jobs and guarantees at most one in-flight execution per
/// job name. The guard is process-local: running two engine instances
/// against the same database needs an external lock, which this scheduler
/// deliberately does not provide.
#[derive(Clone)]
pub struct Scheduler {
    pool: SqlitePool,
    running: Arc<DashMap<&'static str, ()>>,
}

/// Clears the running flag on every exit path, including cancellation.
struct RunningGuard {
    running: Arc<DashMap<&'static str, ()>>,
    name: &'static str,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.remove(self.name);
    }
}

impl Scheduler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, running: Arc::new(DashMap::new()) }
    }

    /// Register a recurring job: every `cadence` the closure is invoked and
    /// its future driven under the single-flight guard.
    pub fn spawn_job<F, Fut>(&self, name: &'static str, cadence: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let sched = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(cadence);
            ticker.tick().await; // consume the immediate first tick
            loop {
                ticker.tick().await;
                sched.run_job(name, job()).await;
            }
        });
    }

    /// Execute one trigger of `name`. Skips (and logs) if a previous
    /// invocation is still in flight; otherwise runs the future to completion
    /// and records the outcome in the execution log.
    pub async fn run_job<Fut>(&self, name: &'static str, fut: Fut) -> RunOutcome
    where
        Fut: Future<Output = Result<String>>,
    {
        if self.running.insert(name, ()).is_some() {
            warn!(job = name, "Skipping trigger: previous run still in progress");
            return RunOutcome::Skipped;
        }
        let _guard = RunningGuard { running: Arc::clone(&self.running), name };

        let started = std::time::Instant::now();
        let (success, message) = match fut.await {
            Ok(summary) => {
                info!(job = name, elapsed_ms = started.elapsed().as_millis() as u64, "{summary}");
                (true, summary)
            }
            Err(e) => {
                error!(job = name, "Job failed: {e}");
                (false, e.to_string())
            }
        };

        self.record(name, success, &message).await;
        RunOutcome::Completed { success }
    }

    /// Append one row to the execution log. A failed write must never abort
    /// the job that just ran, so errors are logged and swallowed here.
    async fn record(&self, name: &str, success: bool, message: &str) {
        let result = sqlx::query(
            "INSERT INTO job_executions (job_name, success, message, ran_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(i64::from(success))
        .bind(message)
        .bind(now_secs())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(job = name, "Failed to write execution log: {e}");
        }
    }

    /// Most recent `n` execution log rows, newest first.
    pub async fn recent_executions(&self, n: i64) -> Result<Vec<JobExecutionRow>> {
        let rows = sqlx::query_as::<_, JobExecutionRow>(
            "SELECT * FROM job_executions ORDER BY id DESC LIMIT ?",
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
