use sqlx::PgPool;

use crate::models::event::EventImpact;
use crate::models::market_forecast::{Target, Timeframe};

/// `event_impact(cluster_id, target, tf) PK`.
pub async fn upsert(pool: &PgPool, impact: &EventImpact) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO event_impact (cluster_id, target, tf, realized_ret, realized_z, computed_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (cluster_id, target, tf) DO UPDATE SET
            realized_ret = EXCLUDED.realized_ret,
            realized_z = EXCLUDED.realized_z,
            computed_at = EXCLUDED.computed_at",
    )
    .bind(&impact.cluster_id)
    .bind(impact.target.as_str())
    .bind(impact.tf.as_str())
    .bind(impact.realized_ret)
    .bind(impact.realized_z)
    .bind(impact.computed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_for_cluster(pool: &PgPool, cluster_id: &str) -> Result<Vec<EventImpactRow>, sqlx::Error> {
    sqlx::query_as::<_, EventImpactRow>(
        "SELECT cluster_id, target, tf, realized_ret, realized_z, computed_at
         FROM event_impact
         WHERE cluster_id = $1",
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventImpactRow {
    pub cluster_id: String,
    pub target: String,
    pub tf: String,
    pub realized_ret: Option<f64>,
    pub realized_z: Option<f64>,
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl EventImpactRow {
    pub fn into_model(self) -> Option<EventImpact> {
        Some(EventImpact {
            cluster_id: self.cluster_id,
            target: match self.target.as_str() {
                "BTC" => Target::Btc,
                "ETH" => Target::Eth,
                "ALTS" => Target::Alts,
                "STABLES" => Target::Stables,
                _ => return None,
            },
            tf: Timeframe::from_str_opt(&self.tf)?,
            realized_ret: self.realized_ret,
            realized_z: self.realized_z,
            computed_at: self.computed_at,
        })
    }
}
