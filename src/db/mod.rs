mod models;

pub use models::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in split_statements(sql) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

/// Split a migration into statements. Comment lines are dropped first so a
/// `;` inside a comment does not cut a statement in two.
fn split_statements(sql: &str) -> Vec<String> {
    let cleaned: String = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    cleaned
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Open the store at `database_url` and bring the schema up to date.
///
/// The pool holds a single long-lived connection: the CLI runs one operation
/// at a time, and `sqlite::memory:` databases only live as long as their
/// connection.
pub async fn connect(database_url: &str) -> Result<DbPool> {
    info!("Opening database at {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool).await?;

    info!("Database ready");
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Migration 001: users, clients, contracts, events
    let has_users_table: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='users'")
            .fetch_optional(pool)
            .await?;
    if has_users_table.is_none() {
        info!("Running database migrations...");
        execute_sql(pool, include_str!("../../migrations/001_initial.sql"))
            .await
            .context("Migration 001 failed")?;
        info!("Migrations completed");
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    connect("sqlite::memory:").await.unwrap()
}
