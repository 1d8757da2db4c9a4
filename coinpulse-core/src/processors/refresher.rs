//! Fetch-and-persist refresh pipeline.
//!
//! One refresh cycle pulls current quotes for the whole catalogue from the
//! provider and appends one price point per tracked asset. Cycles are safe
//! to run redundantly: every run appends fresh observations.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::catalog::AssetCatalog;
use crate::provider::{MarketDataProvider, ProviderError};
use crate::store::{PricePoint, PriceStore, StoreError};

/// Errors that abandon a refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Quote fetch failed or returned malformed data
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Storage could not run the write at all
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accounting for one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Quotes returned by the provider.
    pub fetched: usize,
    /// Price points written.
    pub inserted: u32,
    /// Rows that failed to write; successes are kept regardless.
    pub failed: u32,
    /// Quotes skipped because their id is not in the catalogue.
    pub skipped: usize,
}

/// The fetch-and-persist pipeline.
pub struct Refresher {
    catalog: AssetCatalog,
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn PriceStore>,
}

impl Refresher {
    pub fn new(
        catalog: AssetCatalog,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn PriceStore>,
    ) -> Self {
        Self {
            catalog,
            provider,
            store,
        }
    }

    /// Run one refresh cycle.
    ///
    /// A provider failure abandons the cycle before anything is written.
    /// Row-level write failures are counted in the report; succeeded rows
    /// stay put.
    pub async fn refresh_all(&self) -> Result<RefreshReport, RefreshError> {
        let quotes = self.provider.fetch_quotes(self.catalog.assets()).await?;
        // One timestamp per cycle so the points of a cycle sort together.
        let observed_at = Utc::now();

        let mut report = RefreshReport {
            fetched: quotes.len(),
            ..RefreshReport::default()
        };
        let mut points = Vec::with_capacity(quotes.len());
        for quote in &quotes {
            match self.catalog.resolve(&quote.id) {
                Ok(asset) => points.push(PricePoint {
                    asset,
                    price: quote.current_price,
                    market_cap: quote.market_cap,
                    change_24h: quote.change_24h(),
                    observed_at,
                }),
                Err(_) => {
                    warn!(asset = %quote.id, "Provider returned an untracked asset, skipping");
                    report.skipped += 1;
                }
            }
        }

        if points.is_empty() {
            return Ok(report);
        }

        let outcome = self.store.insert_points(&points).await?;
        report.inserted = outcome.inserted;
        report.failed = outcome.failed;
        if outcome.failed > 0 {
            warn!(
                inserted = outcome.inserted,
                failed = outcome.failed,
                "Refresh cycle persisted partially"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::provider::RawQuote;
    use crate::testkit::{FailingProvider, MemoryPriceStore, StaticProvider};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn catalog() -> AssetCatalog {
        AssetCatalog::new(["bitcoin", "ethereum", "matic-network"]).unwrap()
    }

    fn quote(id: &str, price: Decimal) -> RawQuote {
        RawQuote {
            id: id.to_string(),
            current_price: price,
            market_cap: dec!(1000000),
            price_change_percentage_24h: Some(dec!(1.5)),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_abandons_cycle() {
        let store = Arc::new(MemoryPriceStore::new());
        let refresher = Refresher::new(catalog(), Arc::new(FailingProvider), store.clone());

        let err = refresher.refresh_all().await.unwrap_err();
        assert!(matches!(err, RefreshError::Provider(_)));
        assert_eq!(store.accesses(), 0);
    }

    #[tokio::test]
    async fn test_one_point_per_fetched_asset() {
        let store = Arc::new(MemoryPriceStore::new());
        let provider = Arc::new(StaticProvider::new(vec![
            quote("bitcoin", dec!(67000)),
            quote("ethereum", dec!(3200)),
            quote("matic-network", dec!(0.71)),
        ]));
        let refresher = Refresher::new(catalog(), provider, store.clone());

        let report = refresher.refresh_all().await.unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(store.total_points(), 3);

        // Every point of the cycle carries the same observation time.
        let bitcoin = store.points_for("bitcoin");
        let ethereum = store.points_for("ethereum");
        assert_eq!(bitcoin[0].observed_at, ethereum[0].observed_at);
    }

    #[tokio::test]
    async fn test_partial_persist_keeps_successes() {
        let store = Arc::new(MemoryPriceStore::new());
        store.fail_next_inserts(1);
        let provider = Arc::new(StaticProvider::new(vec![
            quote("bitcoin", dec!(67000)),
            quote("ethereum", dec!(3200)),
            quote("matic-network", dec!(0.71)),
        ]));
        let refresher = Refresher::new(catalog(), provider, store.clone());

        let report = refresher.refresh_all().await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(store.total_points(), 2);
    }

    #[tokio::test]
    async fn test_untracked_quote_skipped() {
        let store = Arc::new(MemoryPriceStore::new());
        let provider = Arc::new(StaticProvider::new(vec![
            quote("bitcoin", dec!(67000)),
            quote("dogecoin", dec!(0.1)),
        ]));
        let refresher = Refresher::new(catalog(), provider, store.clone());

        let report = refresher.refresh_all().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 1);
        assert!(store.points_for("dogecoin").is_empty());
    }

    #[tokio::test]
    async fn test_missing_change_defaults_to_zero() {
        let store = Arc::new(MemoryPriceStore::new());
        let mut flat = quote("bitcoin", dec!(67000));
        flat.price_change_percentage_24h = None;
        let provider = Arc::new(StaticProvider::new(vec![flat]));
        let refresher = Refresher::new(catalog(), provider, store.clone());

        refresher.refresh_all().await.unwrap();
        assert_eq!(store.points_for("bitcoin")[0].change_24h, Decimal::ZERO);
    }
}
