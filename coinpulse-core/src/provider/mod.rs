//! External market-data provider.
//!
//! The provider is an external collaborator: one batched call returns the
//! current market row for every requested asset. Implementations live
//! behind [`MarketDataProvider`] so the refresh pipeline can run against a
//! fake in tests.

mod coingecko;

pub use coingecko::CoinGeckoProvider;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::TrackedAsset;

/// Errors from quote fetching.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request or response decoding error
    #[error("provider request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// Provider returned an error status
    #[error("provider returned status {status}")]
    Api { status: u16 },
}

/// One market row as the provider returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawQuote {
    pub id: String,
    pub current_price: Decimal,
    pub market_cap: Decimal,
    /// Absent when the provider has no 24h history for the asset.
    pub price_change_percentage_24h: Option<Decimal>,
}

impl RawQuote {
    /// The 24h change to store; a missing value counts as no movement.
    pub fn change_24h(&self) -> Decimal {
        self.price_change_percentage_24h.unwrap_or_default()
    }
}

/// Batched quote fetch for the tracked catalogue.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_quotes(&self, assets: &[TrackedAsset]) -> Result<Vec<RawQuote>, ProviderError>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_markets_response() {
        // Trimmed-down rows in the provider's actual shape; unknown fields
        // are ignored.
        let body = r#"[
            {
                "id": "bitcoin",
                "symbol": "btc",
                "name": "Bitcoin",
                "current_price": 67123.45,
                "market_cap": 1320000000000.0,
                "market_cap_rank": 1,
                "price_change_percentage_24h": -1.25
            },
            {
                "id": "ethereum",
                "symbol": "eth",
                "name": "Ethereum",
                "current_price": 3200.5,
                "market_cap": 384000000000.0,
                "market_cap_rank": 2,
                "price_change_percentage_24h": null
            }
        ]"#;
        let quotes: Vec<RawQuote> = serde_json::from_str(body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].id, "bitcoin");
        assert_eq!(quotes[0].change_24h(), dec!(-1.25));
        assert_eq!(quotes[1].price_change_percentage_24h, None);
        assert_eq!(quotes[1].change_24h(), Decimal::ZERO);
    }
}
