//! PostgreSQL price store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;

use super::{InsertOutcome, PricePoint, PriceStore, StoreError};
use crate::catalog::TrackedAsset;

/// Price store over the `price_points` table.
pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPricePoints")]
    async fn insert_points(&self, points: &[PricePoint]) -> Result<InsertOutcome, StoreError> {
        let mut outcome = InsertOutcome::default();
        for point in points {
            let result = sqlx::query(
                "INSERT INTO price_points (asset, price, market_cap, change_24h, observed_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(point.asset.as_str())
            .bind(point.price)
            .bind(point.market_cap)
            .bind(point.change_24h)
            .bind(point.observed_at)
            .execute(&self.pool)
            .await;
            match result {
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    warn!(asset = %point.asset, error = %e, "Price point insert failed");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, err, name = "SQL:GetLatestPricePoint")]
    async fn latest_point(&self, asset: &TrackedAsset) -> Result<Option<PricePoint>, StoreError> {
        let row: Option<PricePointRow> = sqlx::query_as(
            "SELECT price, market_cap, change_24h, observed_at \
             FROM price_points WHERE asset = $1 \
             ORDER BY observed_at DESC, id DESC LIMIT 1",
        )
        .bind(asset.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.into_point(asset.clone())))
    }

    #[tracing::instrument(skip_all, err, name = "SQL:GetRecentPrices")]
    async fn recent_prices(
        &self,
        asset: &TrackedAsset,
        limit: u32,
    ) -> Result<Vec<Decimal>, StoreError> {
        let prices: Vec<Decimal> = sqlx::query_scalar(
            "SELECT price FROM price_points WHERE asset = $1 \
             ORDER BY observed_at DESC, id DESC LIMIT $2",
        )
        .bind(asset.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(prices)
    }
}

#[derive(sqlx::FromRow)]
struct PricePointRow {
    price: Decimal,
    market_cap: Decimal,
    change_24h: Decimal,
    observed_at: DateTime<Utc>,
}

impl PricePointRow {
    fn into_point(self, asset: TrackedAsset) -> PricePoint {
        PricePoint {
            asset,
            price: self.price,
            market_cap: self.market_cap,
            change_24h: self.change_24h,
            observed_at: self.observed_at,
        }
    }
}
