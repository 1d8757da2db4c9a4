//! Bus transport seam.
//!
//! [`EventChannel`](super::EventChannel) owns retry, delivery and drain
//! behavior; transports only know how to open one connection and move raw
//! payloads. Production uses [`NatsTransport`]; tests use the in-memory
//! transport from the testkit.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use super::ChannelError;

/// Stream of raw payloads delivered for one topic subscription.
///
/// The stream ending means the subscription is gone (connection loss,
/// server-side unsubscribe) and the caller must rebuild it.
pub type MessageStream = BoxStream<'static, Bytes>;

/// Factory for bus connections.
#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    /// Open a single connection to the bus at `address`.
    ///
    /// One call maps to one connection attempt; retry lives in the channel.
    async fn connect(&self, address: &str) -> Result<Box<dyn BusConnection>, ChannelError>;
}

/// One live connection to the bus.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Send one payload on `topic`. An error means the transport did not
    /// accept the message.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ChannelError>;

    /// Open a subscription and return its message stream.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, ChannelError>;

    /// Flush outstanding work and release the connection.
    async fn drain(&self) -> Result<(), ChannelError>;
}

/// NATS-backed transport used in production.
///
/// Core NATS matches the channel contract directly: subjects are ephemeral,
/// delivery is at-most-once, nothing is persisted for absent subscribers.
pub struct NatsTransport;

#[async_trait]
impl BusTransport for NatsTransport {
    async fn connect(&self, address: &str) -> Result<Box<dyn BusConnection>, ChannelError> {
        let client = async_nats::connect(address)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        Ok(Box::new(NatsConnection { client }))
    }
}

struct NatsConnection {
    client: async_nats::Client,
}

#[async_trait]
impl BusConnection for NatsConnection {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ChannelError> {
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;
        // The client buffers writes; flush so a rejected send surfaces here
        // rather than on some later call.
        self.client
            .flush()
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream, ChannelError> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| ChannelError::Subscribe(e.to_string()))?;
        Ok(subscriber.map(|message| message.payload).boxed())
    }

    async fn drain(&self) -> Result<(), ChannelError> {
        self.client
            .drain()
            .await
            .map_err(|e| ChannelError::Drain(e.to_string()))
    }
}
