//! Persistence for API keys. Keys themselves are never stored — only the
//! sha256 hash of the `wh_<random>` bearer token (§6).

use sqlx::{Row, SqlitePool};

use crate::error::PersistError;

pub async fn count(pool: &SqlitePool) -> Result<i64, PersistError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_key").fetch_one(pool).await?;
    Ok(count)
}

pub async fn insert(pool: &SqlitePool, key_hash: &str, label: Option<&str>) -> Result<(), PersistError> {
    sqlx::query("INSERT INTO api_key (key_hash, label, created_at) VALUES (?, ?, ?)")
        .bind(key_hash)
        .bind(label)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(())
}

/// Looks up a key by its hash and, if found, touches `last_used_at`.
pub async fn authenticate(pool: &SqlitePool, key_hash: &str) -> Result<bool, PersistError> {
    let row = sqlx::query("SELECT id FROM api_key WHERE key_hash = ?").bind(key_hash).fetch_optional(pool).await?;
    let Some(row) = row else { return Ok(false) };
    let id: i64 = row.get("id");
    sqlx::query("UPDATE api_key SET last_used_at = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_count_then_authenticate() {
        let pool = crate::storage::open_in_memory().await.unwrap();
        assert_eq!(count(&pool).await.unwrap(), 0);

        insert(&pool, "abc123", Some("bootstrap")).await.unwrap();
        assert_eq!(count(&pool).await.unwrap(), 1);
        assert!(authenticate(&pool, "abc123").await.unwrap());
        assert!(!authenticate(&pool, "nope").await.unwrap());
    }
}
