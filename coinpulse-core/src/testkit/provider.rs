//! Market-data provider fakes.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::catalog::TrackedAsset;
use crate::provider::{MarketDataProvider, ProviderError, RawQuote};

/// Provider returning a fixed quote list, counting calls.
pub struct StaticProvider {
    quotes: Vec<RawQuote>,
    calls: AtomicU32,
}

impl StaticProvider {
    pub fn new(quotes: Vec<RawQuote>) -> Self {
        Self {
            quotes,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn fetch_quotes(&self, _assets: &[TrackedAsset]) -> Result<Vec<RawQuote>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.quotes.clone())
    }
}

/// Provider whose every fetch fails.
pub struct FailingProvider;

#[async_trait]
impl MarketDataProvider for FailingProvider {
    async fn fetch_quotes(&self, _assets: &[TrackedAsset]) -> Result<Vec<RawQuote>, ProviderError> {
        Err(ProviderError::Api { status: 500 })
    }
}
