//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions. They are all simple functions (rather than stateful
//! structs) that accept a `&mut SqliteConnection` argument, so callers can obtain a connection from a pool or
//! embed a call inside an atomic transaction without any other changes.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod orders;
pub mod orphans;
pub mod reservations;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/mpg_store.db";

pub fn db_url() -> String {
    let result = env::var("MPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("MPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// A connection pool with a busy timeout, so that transient lock contention inside the store is retried by
/// SQLite itself (bounded) before an error ever surfaces to the webhook path.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqlxError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await?;
    Ok(())
}
