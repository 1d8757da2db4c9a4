//! Price-point persistence.
//!
//! One [`PricePoint`] per (asset, refresh cycle), append-only. Writes are
//! independent rows with no transaction discipline; readers rely on the
//! per-asset `observed_at` ordering.

mod postgres;

pub use postgres::PgPriceStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::catalog::TrackedAsset;

/// One persisted market observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub asset: TrackedAsset,
    pub price: Decimal,
    pub market_cap: Decimal,
    pub change_24h: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Row-level accounting for one `insert_points` call.
///
/// Inserts succeed or fail per row; succeeded rows are never rolled back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u32,
    pub failed: u32,
}

/// Errors from the price store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage operations the rest of the system depends on.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Append one row per point. Row failures are counted, not propagated;
    /// an `Err` means the operation as a whole could not run.
    async fn insert_points(&self, points: &[PricePoint]) -> Result<InsertOutcome, StoreError>;

    /// The newest point for `asset`, if any.
    async fn latest_point(&self, asset: &TrackedAsset) -> Result<Option<PricePoint>, StoreError>;

    /// Up to `limit` prices for `asset`, newest first.
    async fn recent_prices(
        &self,
        asset: &TrackedAsset,
        limit: u32,
    ) -> Result<Vec<Decimal>, StoreError>;
}
