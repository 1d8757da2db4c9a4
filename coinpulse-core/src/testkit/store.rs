//! In-memory price store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{lock, take_scripted_failure};
use crate::catalog::TrackedAsset;
use crate::store::{InsertOutcome, PricePoint, PriceStore, StoreError};

/// Map-backed store with an access counter and scriptable insert failures.
///
/// The counter covers every trait method, so a test can prove a code path
/// never touched storage at all.
#[derive(Default)]
pub struct MemoryPriceStore {
    points: Mutex<HashMap<String, Vec<PricePoint>>>,
    accesses: AtomicU32,
    fail_inserts: AtomicU32,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accesses(&self) -> u32 {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Script the next `n` row inserts to fail.
    pub fn fail_next_inserts(&self, n: u32) {
        self.fail_inserts.store(n, Ordering::SeqCst);
    }

    /// Snapshot of the stored points for one asset, in insertion order.
    pub fn points_for(&self, asset: &str) -> Vec<PricePoint> {
        lock(&self.points).get(asset).cloned().unwrap_or_default()
    }

    pub fn total_points(&self) -> usize {
        lock(&self.points).values().map(Vec::len).sum()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn insert_points(&self, points: &[PricePoint]) -> Result<InsertOutcome, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let mut outcome = InsertOutcome::default();
        let mut map = lock(&self.points);
        for point in points {
            if take_scripted_failure(&self.fail_inserts) {
                outcome.failed += 1;
                continue;
            }
            map.entry(point.asset.as_str().to_string())
                .or_default()
                .push(point.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn latest_point(&self, asset: &TrackedAsset) -> Result<Option<PricePoint>, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let map = lock(&self.points);
        // max_by_key keeps the last maximum, matching the database's
        // insertion-order tiebreak for equal timestamps.
        Ok(map
            .get(asset.as_str())
            .and_then(|points| points.iter().max_by_key(|point| point.observed_at))
            .cloned())
    }

    async fn recent_prices(
        &self,
        asset: &TrackedAsset,
        limit: u32,
    ) -> Result<Vec<Decimal>, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let map = lock(&self.points);
        let mut rows: Vec<(DateTime<Utc>, usize, Decimal)> = map
            .get(asset.as_str())
            .map(|points| {
                points
                    .iter()
                    .enumerate()
                    .map(|(index, point)| (point.observed_at, index, point.price))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|(_, _, price)| price)
            .collect())
    }
}
