//! Trigger-event consumer.
//!
//! Subscribes to the trigger topic and runs the refresh pipeline once per
//! delivered message. Malformed payloads and refresh failures are logged by
//! the subscription loop and the message is dropped; nothing is retried per
//! message, and the loop itself never dies.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::channel::{ChannelError, EventChannel, EventHandler, HandlerError};
use crate::events::{TriggerEvent, UPDATE_TOPIC};
use crate::processors::refresher::Refresher;

/// Handles trigger events with at most one refresh attempt per message.
pub struct UpdateConsumer {
    refresher: Arc<Refresher>,
}

impl UpdateConsumer {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self { refresher }
    }

    /// Attach the consumer to the channel's trigger topic.
    pub async fn start(self, channel: &Arc<EventChannel>) -> Result<(), ChannelError> {
        info!(topic = UPDATE_TOPIC, "Starting update consumer");
        channel.subscribe(UPDATE_TOPIC, Arc::new(self)).await
    }
}

#[async_trait]
impl EventHandler for UpdateConsumer {
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError> {
        let event: TriggerEvent = serde_json::from_slice(&payload)
            .map_err(|e| format!("malformed trigger payload: {e}"))?;
        if !event.is_update() {
            debug!(trigger = %event.trigger, "Ignoring non-update trigger");
            return Ok(());
        }

        debug!(timestamp = %event.timestamp, "Refresh trigger received");
        let report = self.refresher.refresh_all().await?;
        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            failed = report.failed,
            "Refresh cycle completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::catalog::AssetCatalog;
    use crate::channel::ReconnectPolicy;
    use crate::provider::RawQuote;
    use crate::testkit::{MemoryBus, MemoryPriceStore, MemoryTransport, StaticProvider};
    use rust_decimal_macros::dec;

    struct Fixture {
        bus: MemoryBus,
        channel: Arc<EventChannel>,
        provider: Arc<StaticProvider>,
        store: Arc<MemoryPriceStore>,
    }

    async fn start_consumer() -> Fixture {
        let bus = MemoryBus::new();
        let channel = Arc::new(EventChannel::new(
            Arc::new(MemoryTransport::new(&bus)),
            "mem://bus",
            ReconnectPolicy::default(),
        ));
        let catalog = AssetCatalog::new(["bitcoin"]).unwrap();
        let provider = Arc::new(StaticProvider::new(vec![RawQuote {
            id: "bitcoin".to_string(),
            current_price: dec!(67000),
            market_cap: dec!(1320000000000),
            price_change_percentage_24h: Some(dec!(-1.25)),
        }]));
        let store = Arc::new(MemoryPriceStore::new());
        let refresher = Arc::new(Refresher::new(catalog, provider.clone(), store.clone()));

        UpdateConsumer::new(refresher)
            .start(&channel)
            .await
            .unwrap();
        bus.wait_for_subscribers(UPDATE_TOPIC, 1).await;

        Fixture {
            bus,
            channel,
            provider,
            store,
        }
    }

    async fn wait_for_points(store: &MemoryPriceStore, count: usize) {
        while store.total_points() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_refresh_runs_once_per_trigger() {
        let fixture = start_consumer().await;

        let event = TriggerEvent::update_now();
        fixture.channel.publish(UPDATE_TOPIC, &event).await.unwrap();
        wait_for_points(&fixture.store, 1).await;

        assert_eq!(fixture.provider.calls(), 1);
        assert_eq!(fixture.store.points_for("bitcoin").len(), 1);

        fixture.channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped_without_killing_loop() {
        let fixture = start_consumer().await;

        fixture
            .bus
            .send(UPDATE_TOPIC, Bytes::from_static(b"{ not json"));
        fixture
            .channel
            .publish(UPDATE_TOPIC, &TriggerEvent::update_now())
            .await
            .unwrap();
        wait_for_points(&fixture.store, 1).await;

        // Only the valid trigger reached the pipeline.
        assert_eq!(fixture.provider.calls(), 1);

        fixture.channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_update_trigger_ignored() {
        let fixture = start_consumer().await;

        fixture.bus.send(
            UPDATE_TOPIC,
            Bytes::from_static(br#"{"trigger": "noop", "timestamp": "2024-05-01T12:00:00Z"}"#),
        );
        fixture
            .channel
            .publish(UPDATE_TOPIC, &TriggerEvent::update_now())
            .await
            .unwrap();
        wait_for_points(&fixture.store, 1).await;

        // The noop trigger handled before the update did not refresh.
        assert_eq!(fixture.provider.calls(), 1);

        fixture.channel.close().await.unwrap();
    }
}
