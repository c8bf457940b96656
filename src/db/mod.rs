pub mod models;
pub mod schema;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};

use crate::error::Result;

/// Open (creating if missing) the SQLite database and ensure the schema exists.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    schema::init(&pool).await?;
    Ok(pool)
}

/// Fresh in-memory database with the full schema, for tests.
///
/// Capped at one connection — every pooled connection to `sqlite::memory:`
/// would otherwise get its own private database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    schema::init(&pool).await.expect("schema init");
    pool
}
