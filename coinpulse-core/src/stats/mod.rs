//! Read-side statistics queries.
//!
//! [`StatsQueryService`] answers the two read operations: the latest stored
//! observation for an asset and the population standard deviation over the
//! most recent price window. Asset ids are validated against the catalogue
//! before storage is touched.

pub mod summary;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::catalog::{AssetCatalog, UnsupportedAsset};
use crate::stats::summary::StatsError;
use crate::store::{PriceStore, StoreError};

/// Number of most-recent points the deviation window covers.
pub const DEFAULT_WINDOW: u32 = 100;

/// Latest stored observation for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestQuote {
    pub price: Decimal,
    pub market_cap: Decimal,
    pub change_24h: Decimal,
}

/// Errors from the query service.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Asset outside the configured catalogue
    #[error(transparent)]
    UnsupportedAsset(#[from] UnsupportedAsset),

    /// Valid asset with no stored data yet
    #[error("no data found for asset '{0}'")]
    NotFound(String),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Summary invariant violation, unreachable behind the NotFound check
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Serves latest-value and deviation reads.
pub struct StatsQueryService {
    catalog: AssetCatalog,
    store: Arc<dyn PriceStore>,
    window: u32,
}

impl StatsQueryService {
    pub fn new(catalog: AssetCatalog, store: Arc<dyn PriceStore>) -> Self {
        Self {
            catalog,
            store,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Latest stored values for `asset`.
    pub async fn latest(&self, asset: &str) -> Result<LatestQuote, QueryError> {
        let asset = self.catalog.resolve(asset)?;
        let point = self
            .store
            .latest_point(&asset)
            .await?
            .ok_or_else(|| QueryError::NotFound(asset.to_string()))?;
        Ok(LatestQuote {
            price: point.price,
            market_cap: point.market_cap,
            change_24h: point.change_24h,
        })
    }

    /// Population standard deviation over the most recent price window.
    pub async fn deviation(&self, asset: &str) -> Result<f64, QueryError> {
        let asset = self.catalog.resolve(asset)?;
        let prices = self.store.recent_prices(&asset, self.window).await?;
        if prices.is_empty() {
            return Err(QueryError::NotFound(asset.to_string()));
        }
        let samples: Vec<f64> = prices
            .iter()
            .map(|price| price.to_f64().unwrap_or_default())
            .collect();
        match summary::population_std_dev(&samples) {
            Ok(deviation) => Ok(deviation),
            Err(e) => {
                // Unreachable behind the empty check above.
                error!(
                    asset = %asset,
                    samples = samples.len(),
                    error = %e,
                    "Deviation summary failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::PricePoint;
    use crate::testkit::MemoryPriceStore;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn catalog() -> AssetCatalog {
        AssetCatalog::new(["bitcoin", "ethereum"]).unwrap()
    }

    fn point(catalog: &AssetCatalog, asset: &str, price: Decimal, minute: i64) -> PricePoint {
        PricePoint {
            asset: catalog.resolve(asset).unwrap(),
            price,
            market_cap: dec!(1000000),
            change_24h: dec!(0.5),
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn test_unsupported_asset_rejected_before_storage_access() {
        let store = Arc::new(MemoryPriceStore::new());
        let service = StatsQueryService::new(catalog(), store.clone());

        let err = service.latest("dogecoin").await.unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedAsset(_)));
        let err = service.deviation("dogecoin").await.unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedAsset(_)));

        assert_eq!(store.accesses(), 0);
    }

    #[tokio::test]
    async fn test_latest_without_data_is_not_found() {
        let store = Arc::new(MemoryPriceStore::new());
        let service = StatsQueryService::new(catalog(), store);
        let err = service.latest("bitcoin").await.unwrap_err();
        assert!(matches!(err, QueryError::NotFound(asset) if asset == "bitcoin"));
    }

    #[tokio::test]
    async fn test_latest_returns_newest_point() {
        let catalog = catalog();
        let store = Arc::new(MemoryPriceStore::new());
        store
            .insert_points(&[
                point(&catalog, "bitcoin", dec!(100), 0),
                point(&catalog, "bitcoin", dec!(200), 5),
                point(&catalog, "ethereum", dec!(999), 9),
            ])
            .await
            .unwrap();

        let service = StatsQueryService::new(catalog, store);
        let quote = service.latest("bitcoin").await.unwrap();
        assert_eq!(quote.price, dec!(200));
        assert_eq!(quote.market_cap, dec!(1000000));
        assert_eq!(quote.change_24h, dec!(0.5));
    }

    #[tokio::test]
    async fn test_deviation_without_data_is_not_found() {
        let store = Arc::new(MemoryPriceStore::new());
        let service = StatsQueryService::new(catalog(), store);
        let err = service.deviation("bitcoin").await.unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deviation_uses_only_most_recent_window() {
        let catalog = catalog();
        let store = Arc::new(MemoryPriceStore::new());
        // One point more than the window; the oldest (an outlier) must be
        // excluded or the deviation would be far from zero.
        store
            .insert_points(&[
                point(&catalog, "bitcoin", dec!(100000), 0),
                point(&catalog, "bitcoin", dec!(10), 1),
                point(&catalog, "bitcoin", dec!(10), 2),
                point(&catalog, "bitcoin", dec!(10), 3),
            ])
            .await
            .unwrap();

        let service = StatsQueryService::new(catalog, store).with_window(3);
        assert_eq!(service.deviation("bitcoin").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_deviation_of_known_window() {
        let catalog = catalog();
        let store = Arc::new(MemoryPriceStore::new());
        let points: Vec<PricePoint> = (1..=5)
            .map(|i| point(&catalog, "bitcoin", Decimal::from(i), i64::from(i)))
            .collect();
        store.insert_points(&points).await.unwrap();

        let service = StatsQueryService::new(catalog, store);
        assert_eq!(service.deviation("bitcoin").await.unwrap(), 1.41);
    }
}
