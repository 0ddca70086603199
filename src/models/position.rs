use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Represents the current holdings of a particular stock within a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: uuid::Uuid,
    pub portfolio_id: uuid::Uuid,
    pub ticker: String,
    pub shares: BigDecimal,
    pub avg_buy_price: BigDecimal,
    pub created_at: chrono::DateTime<chrono::Utc>
}

impl Position {
    #[allow(dead_code)]
    pub(crate) fn new(portfolio_id: uuid::Uuid, ticker: String, shares: BigDecimal, avg_buy_price: BigDecimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            portfolio_id,
            ticker,
            shares,
            avg_buy_price,
            created_at: chrono::Utc::now()
        }
    }
}