//! In-memory bus transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{lock, take_scripted_failure};
use crate::channel::{BusConnection, BusTransport, ChannelError, MessageStream};

const TOPIC_BUFFER: usize = 64;

/// Shared in-memory hub standing in for a bus server.
///
/// Topics are broadcast channels created on demand. Tests talk to the hub
/// directly (inject payloads, observe deliveries, kill topics) while the
/// channel under test goes through a [`MemoryTransport`].
#[derive(Clone, Default)]
pub struct MemoryBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        let mut topics = lock(&self.topics);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_BUFFER).0)
            .clone()
    }

    /// Inject a raw payload, bypassing any channel under test.
    pub fn send(&self, topic: &str, payload: Bytes) {
        let _ = self.sender(topic).send(payload);
    }

    /// Observe a topic directly. The inbox counts as a subscriber.
    pub fn open_inbox(&self, topic: &str) -> broadcast::Receiver<Bytes> {
        self.sender(topic).subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.topics)
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a topic so every live subscription stream on it ends.
    pub fn reset_topic(&self, topic: &str) {
        lock(&self.topics).remove(topic);
    }

    /// Yield until at least `min` subscribers are attached to `topic`.
    pub async fn wait_for_subscribers(&self, topic: &str, min: usize) {
        while self.subscriber_count(topic) < min {
            tokio::task::yield_now().await;
        }
    }
}

/// Transport over a [`MemoryBus`] with scriptable failures and counters.
///
/// Clones share their bus handle and counters.
#[derive(Clone)]
pub struct MemoryTransport {
    bus: MemoryBus,
    connect_attempts: Arc<AtomicU32>,
    fail_connects: Arc<AtomicU32>,
    fail_publishes: Arc<AtomicU32>,
    drains: Arc<AtomicU32>,
}

impl MemoryTransport {
    pub fn new(bus: &MemoryBus) -> Self {
        Self {
            bus: bus.clone(),
            connect_attempts: Arc::new(AtomicU32::new(0)),
            fail_connects: Arc::new(AtomicU32::new(0)),
            fail_publishes: Arc::new(AtomicU32::new(0)),
            drains: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Script the next `n` connection attempts to fail.
    pub fn fail_next_connects(self, n: u32) -> Self {
        self.fail_connects.store(n, Ordering::SeqCst);
        self
    }

    /// Script the next `n` publishes to be rejected by the transport.
    pub fn fail_next_publishes(&self, n: u32) {
        self.fail_publishes.store(n, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn drains(&self) -> u32 {
        self.drains.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusTransport for MemoryTransport {
    async fn connect(&self, _address: &str) -> Result<Box<dyn BusConnection>, ChannelError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if take_scripted_failure(&self.fail_connects) {
            return Err(ChannelError::Connect("scripted connect failure".to_string()));
        }
        Ok(Box::new(MemoryConnection {
            transport: self.clone(),
        }))
    }
}

struct MemoryConnection {
    transport: MemoryTransport,
}

#[async_trait]
impl BusConnection for MemoryConnection {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ChannelError> {
        if take_scripted_failure(&self.transport.fail_publishes) {
            return Err(ChannelError::Publish("scripted publish failure".to_string()));
        }
        self.transport.bus.send(topic, payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream, ChannelError> {
        let receiver = self.transport.bus.open_inbox(topic);
        let stream =
            BroadcastStream::new(receiver).filter_map(|result| async move { result.ok() });
        Ok(stream.boxed())
    }

    async fn drain(&self) -> Result<(), ChannelError> {
        self.transport.drains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
