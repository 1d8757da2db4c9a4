//! End-to-end pipeline test: a cron firing travels over the bus, drives a
//! refresh cycle, and the stored points back the query service.

use std::sync::Arc;

use coinpulse_core::catalog::AssetCatalog;
use coinpulse_core::channel::{EventChannel, ReconnectPolicy};
use coinpulse_core::events::UPDATE_TOPIC;
use coinpulse_core::processors::{Refresher, Scheduler, UpdateConsumer};
use coinpulse_core::provider::RawQuote;
use coinpulse_core::stats::StatsQueryService;
use coinpulse_core::testkit::{MemoryBus, MemoryPriceStore, MemoryTransport, StaticProvider};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn quote(id: &str, price: Decimal, market_cap: Decimal, change: Option<Decimal>) -> RawQuote {
    RawQuote {
        id: id.to_string(),
        current_price: price,
        market_cap,
        price_change_percentage_24h: change,
    }
}

#[tokio::test(start_paused = true)]
async fn scheduled_trigger_flows_into_query_service() {
    let bus = MemoryBus::new();
    let channel = Arc::new(EventChannel::new(
        Arc::new(MemoryTransport::new(&bus)),
        "mem://bus",
        ReconnectPolicy::default(),
    ));
    let catalog = AssetCatalog::new(["bitcoin", "ethereum", "matic-network"]).unwrap();
    let provider = Arc::new(StaticProvider::new(vec![
        quote("bitcoin", dec!(67000.12), dec!(1320000000000), Some(dec!(2.4))),
        quote("ethereum", dec!(1850.5), dec!(222000000000), Some(dec!(-0.8))),
        quote("matic-network", dec!(0.71), dec!(6600000000), None),
    ]));
    let store = Arc::new(MemoryPriceStore::new());
    let refresher = Arc::new(Refresher::new(catalog.clone(), provider.clone(), store.clone()));

    let mut inbox = bus.open_inbox(UPDATE_TOPIC);
    UpdateConsumer::new(refresher).start(&channel).await.unwrap();
    bus.wait_for_subscribers(UPDATE_TOPIC, 2).await;

    let mut scheduler = Scheduler::new(channel.clone());
    scheduler.initialize("* * * * * *");
    assert_eq!(scheduler.active_jobs(), 1);

    // Park until the first firing travels over the bus, then let the consumer
    // finish persisting the cycle.
    inbox.recv().await.unwrap();
    while store.total_points() < 3 {
        tokio::task::yield_now().await;
    }
    scheduler.stop_all().await;
    channel.close().await.unwrap();

    assert!(provider.calls() >= 1);

    // Every firing persisted the full asset batch.
    let cycles = store.points_for("bitcoin").len();
    assert!(cycles >= 1);
    assert_eq!(store.points_for("ethereum").len(), cycles);
    assert_eq!(store.points_for("matic-network").len(), cycles);

    let service = StatsQueryService::new(catalog, store);
    let latest = service.latest("bitcoin").await.unwrap();
    assert_eq!(latest.price, dec!(67000.12));
    assert_eq!(latest.market_cap, dec!(1320000000000));
    assert_eq!(latest.change_24h, dec!(2.4));

    let flat = service.latest("matic-network").await.unwrap();
    assert_eq!(flat.change_24h, Decimal::ZERO);

    // All stored prices for an asset are identical, so the spread is zero.
    assert_eq!(service.deviation("bitcoin").await.unwrap(), 0.0);
}
