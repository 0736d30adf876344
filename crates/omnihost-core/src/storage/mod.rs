//! The embedded relational store (SQLite via `sqlx`) and its per-resource
//! repo modules. See SPEC_FULL.md §2 / DESIGN.md for why SQLite replaces the
//! teacher's bespoke chunked binary format here.

pub mod api_key_repo;
pub mod device_repo;
pub mod host_repo;
pub mod network_repo;
pub mod query;
pub mod schema;
pub mod session_repo;
pub mod storage_repo;
pub mod system_repo;
pub mod task_repo;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::PersistError;

/// Opens (creating if absent) the SQLite database at `database_path` and
/// applies schema migrations. WAL journal mode lets collectors write while
/// the Query API reads concurrently.
pub async fn open(database_path: &str) -> Result<SqlitePool, PersistError> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
    schema::migrate(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests — each call gets an isolated instance.
#[cfg(test)]
pub async fn open_in_memory() -> Result<SqlitePool, PersistError> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    schema::migrate(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostInfo;

    #[tokio::test]
    async fn migrate_then_roundtrip_host_info() {
        let pool = open_in_memory().await.unwrap();
        let mut info = HostInfo::new("host1");
        info.hostname = "host1.local".to_string();
        host_repo::upsert(&pool, &info).await.unwrap();

        let fetched = host_repo::get(&pool, "host1").await.unwrap().unwrap();
        assert_eq!(fetched.hostname, "host1.local");
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = open_in_memory().await.unwrap();
        schema::migrate(&pool).await.unwrap();
        schema::migrate(&pool).await.unwrap();
    }
}
