use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::event::PriceBar;

/// `price_bars(asset, ts_utc) PK`, append-only (upsert by key).
pub async fn upsert(pool: &PgPool, bar: &PriceBar) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO price_bars (asset, ts_utc, open, high, low, close, volume)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (asset, ts_utc) DO UPDATE SET
            open = EXCLUDED.open, high = EXCLUDED.high, low = EXCLUDED.low,
            close = EXCLUDED.close, volume = EXCLUDED.volume",
    )
    .bind(&bar.asset)
    .bind(bar.ts_utc)
    .bind(bar.open)
    .bind(bar.high)
    .bind(bar.low)
    .bind(bar.close)
    .bind(bar.volume)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_window(
    pool: &PgPool,
    asset: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<PriceBar>, sqlx::Error> {
    sqlx::query_as::<_, PriceBar>(
        "SELECT asset, ts_utc, open, high, low, close, volume
         FROM price_bars
         WHERE asset = $1 AND ts_utc BETWEEN $2 AND $3
         ORDER BY ts_utc ASC",
    )
    .bind(asset)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn fetch_latest(pool: &PgPool, asset: &str) -> Result<Option<PriceBar>, sqlx::Error> {
    sqlx::query_as::<_, PriceBar>(
        "SELECT asset, ts_utc, open, high, low, close, volume
         FROM price_bars
         WHERE asset = $1
         ORDER BY ts_utc DESC
         LIMIT 1",
    )
    .bind(asset)
    .fetch_optional(pool)
    .await
}
