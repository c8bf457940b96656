pub mod abandonment;
pub mod leaderboard;
pub mod milestones;
pub mod refresh;
pub mod stats;
