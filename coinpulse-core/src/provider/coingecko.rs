//! CoinGecko markets client.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{MarketDataProvider, ProviderError, RawQuote};
use crate::catalog::TrackedAsset;

/// Client for the CoinGecko `/coins/markets` endpoint.
///
/// One request covers the whole catalogue; quotes come back priced in USD
/// with the 24h percentage change included.
pub struct CoinGeckoProvider {
    base_url: Url,
    http_client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_quotes(&self, assets: &[TrackedAsset]) -> Result<Vec<RawQuote>, ProviderError> {
        let ids = assets
            .iter()
            .map(TrackedAsset::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/coins/markets",
            self.base_url.as_str().trim_end_matches('/')
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("ids", ids.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", "100"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ProviderError::Api {
                status: response.status().as_u16(),
            });
        }

        let quotes: Vec<RawQuote> = response.json().await?;
        debug!(
            requested = assets.len(),
            returned = quotes.len(),
            "Fetched market quotes"
        );
        Ok(quotes)
    }
}
