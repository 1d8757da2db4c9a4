//! Tracked-asset catalogue.
//!
//! The catalogue is built once from configuration and fixes the universe of
//! assets this process collects and serves. Every externally supplied asset
//! id passes through [`AssetCatalog::resolve`] before it reaches the store
//! or the provider.

use serde::Serialize;
use thiserror::Error;

/// A provider asset id (e.g. `bitcoin`) that is known to the catalogue.
///
/// Only constructed through [`AssetCatalog`], so holding one proves the id
/// was validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackedAsset(String);

impl TrackedAsset {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from catalogue construction.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The configured asset list was empty
    #[error("asset catalogue is empty")]
    Empty,

    /// The configured asset list repeats an id
    #[error("duplicate asset in catalogue: {0}")]
    Duplicate(String),
}

/// A request named an asset the catalogue does not contain.
#[derive(Debug, Clone, Error)]
#[error("unsupported asset '{asset}', must be one of: {supported}")]
pub struct UnsupportedAsset {
    pub asset: String,
    pub supported: String,
}

/// The fixed set of assets tracked by this deployment.
///
/// Small and scanned linearly; immutable after construction.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    assets: Vec<TrackedAsset>,
}

impl AssetCatalog {
    pub fn new<I, S>(ids: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut assets: Vec<TrackedAsset> = Vec::new();
        for id in ids {
            let id = id.into();
            if assets.iter().any(|a| a.0 == id) {
                return Err(CatalogError::Duplicate(id));
            }
            assets.push(TrackedAsset(id));
        }
        if assets.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { assets })
    }

    /// Validate an externally supplied id against the catalogue.
    pub fn resolve(&self, raw: &str) -> Result<TrackedAsset, UnsupportedAsset> {
        self.assets
            .iter()
            .find(|a| a.0 == raw)
            .cloned()
            .ok_or_else(|| UnsupportedAsset {
                asset: raw.to_string(),
                supported: self.supported_list(),
            })
    }

    pub fn assets(&self) -> &[TrackedAsset] {
        &self.assets
    }

    /// Comma-separated catalogue contents, used in client-facing errors.
    pub fn supported_list(&self) -> String {
        self.assets
            .iter()
            .map(|a| a.0.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_resolve_known_asset() {
        let catalog = AssetCatalog::new(["bitcoin", "ethereum"]).unwrap();
        let asset = catalog.resolve("bitcoin").unwrap();
        assert_eq!(asset.as_str(), "bitcoin");
    }

    #[test]
    fn test_resolve_unknown_asset() {
        let catalog = AssetCatalog::new(["bitcoin", "ethereum"]).unwrap();
        let err = catalog.resolve("dogecoin").unwrap_err();
        assert_eq!(err.asset, "dogecoin");
        assert_eq!(err.supported, "bitcoin, ethereum");
    }

    #[test]
    fn test_empty_catalogue_rejected() {
        let err = AssetCatalog::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CatalogError::Empty));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = AssetCatalog::new(["bitcoin", "bitcoin"]).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(id) if id == "bitcoin"));
    }
}
