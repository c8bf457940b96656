mod config;
mod db;
mod error;
mod jobs;
mod mailer;
mod provider;
mod scheduler;
mod trend;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, FAILURE_BACKOFF_MS, PROXIMITY_NUDGE_DELTA};
use crate::error::Result;
use crate::jobs::abandonment::AbandonmentJob;
use crate::jobs::leaderboard::LeaderboardEngine;
use crate::jobs::milestones::MilestoneEngine;
use crate::jobs::refresh::RefreshJob;
use crate::mailer::HttpMailer;
use crate::provider::HttpMetricsProvider;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let scheduler = Scheduler::new(pool.clone());
    for exec in scheduler.recent_executions(5).await?.iter().rev() {
        info!(
            job = %exec.job_name,
            success = exec.success == 1,
            "Previous run: {}",
            exec.message,
        );
    }

    let provider = Arc::new(HttpMetricsProvider::new(cfg.provider_api_url.clone())?);
    let mailer = Arc::new(HttpMailer::new(cfg.mail_api_url.clone(), cfg.mail_from.clone())?);

    // Metrics refresh: sequential provider crawl + snapshot history + stats.
    let refresh = Arc::new(RefreshJob::new(
        pool.clone(),
        provider,
        Duration::from_millis(cfg.fetch_delay_ms),
        Duration::from_millis(FAILURE_BACKOFF_MS),
    ));
    scheduler.spawn_job(
        "metrics_refresh",
        Duration::from_secs(cfg.refresh_interval_secs),
        move || {
            let job = Arc::clone(&refresh);
            async move { job.run_once().await }
        },
    );

    // Badge awarding runs ahead of the leaderboard rebuild in the same cycle
    // so entries snapshot a badge list that is at most one cycle stale.
    let milestones = Arc::new(MilestoneEngine::new(pool.clone()));
    let leaderboards = Arc::new(LeaderboardEngine::new(pool.clone()));
    scheduler.spawn_job(
        "gamification",
        Duration::from_secs(cfg.leaderboard_interval_secs),
        move || {
            let milestones = Arc::clone(&milestones);
            let leaderboards = Arc::clone(&leaderboards);
            async move {
                let badge_summary = milestones.run_once().await?;
                let board_summary = leaderboards.run_once().await?;
                let near = milestones.proximity(PROXIMITY_NUDGE_DELTA).await?;
                if !near.is_empty() {
                    info!(
                        publishers = near.len(),
                        "Publishers within reach of their next badge"
                    );
                }
                Ok(format!("{badge_summary}; {board_summary}"))
            }
        },
    );

    let recovery = Arc::new(AbandonmentJob::new(
        pool.clone(),
        mailer,
        Duration::from_secs(cfg.abandonment_min_age_hours * 3_600),
        Duration::from_secs(cfg.abandonment_max_age_hours * 3_600),
    ));
    scheduler.spawn_job(
        "abandoned_orders",
        Duration::from_secs(cfg.abandonment_interval_secs),
        move || {
            let job = Arc::clone(&recovery);
            async move { job.run_once().await }
        },
    );

    info!(
        refresh_secs = cfg.refresh_interval_secs,
        leaderboard_secs = cfg.leaderboard_interval_secs,
        abandonment_secs = cfg.abandonment_interval_secs,
        "Engine running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
