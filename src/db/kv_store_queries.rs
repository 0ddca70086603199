use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

/// `kv_store` — generic key/value persistence for long-lived engine
/// state that doesn't warrant its own table (debate cache entries,
/// last-good quote snapshots surviving a restart, hysteresis carry
/// state).
pub async fn put(pool: &PgPool, key: &str, value: &Value, expires_at: Option<DateTime<Utc>>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kv_store (key, value, updated_at, expires_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at, expires_at = EXCLUDED.expires_at",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, key: &str) -> Result<Option<Value>, sqlx::Error> {
    let row: Option<(Value, Option<DateTime<Utc>>)> =
        sqlx::query_as("SELECT value, expires_at FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(value, expires_at)| match expires_at {
        Some(exp) if exp <= Utc::now() => None,
        _ => Some(value),
    }))
}

pub async fn delete(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM kv_store WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM kv_store WHERE expires_at IS NOT NULL AND expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
