//! Event bus channel.
//!
//! [`EventChannel`] owns the process's single bus connection and everything
//! around it:
//! - Connecting with a fixed-delay retry loop, at most one attempt in flight
//! - Publishing JSON-encoded events, blocking until a connection exists
//! - Subscription loops as owned tasks that survive handler errors and
//!   rebuild themselves when the underlying stream ends
//! - An idempotent graceful drain on close
//!
//! Construction is explicit: callers build the channel with a transport, an
//! address and a [`ReconnectPolicy`], then share it behind an [`Arc`].

mod transport;

pub use transport::{BusConnection, BusTransport, MessageStream, NatsTransport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A connection attempt failed
    #[error("bus connection failed: {0}")]
    Connect(String),

    /// The transport did not accept a published message
    #[error("publish rejected: {0}")]
    Publish(String),

    /// Opening a subscription failed
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Draining the connection failed
    #[error("drain failed: {0}")]
    Drain(String),

    /// An event payload could not be encoded
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The channel was closed
    #[error("channel is closed")]
    Closed,
}

/// Errors a subscription handler may return; logged, never fatal.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receives the messages of one topic subscription.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, payload: Bytes) -> Result<(), HandlerError>;
}

/// How the channel retries failed connection attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Self::DEFAULT_DELAY,
        }
    }
}

/// The process's connection to the event bus.
pub struct EventChannel {
    transport: Arc<dyn BusTransport>,
    address: String,
    policy: ReconnectPolicy,
    // Single connection slot; holding the lock across the retry loop is
    // what keeps concurrent attempts down to one.
    connection: Mutex<Option<Arc<dyn BusConnection>>>,
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
    closed_tx: watch::Sender<bool>,
}

impl EventChannel {
    pub fn new(
        transport: Arc<dyn BusTransport>,
        address: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            transport,
            address: address.into(),
            policy,
            connection: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            closed_tx,
        }
    }

    /// Establish the connection, retrying with the policy delay until it
    /// succeeds or the channel is closed.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        self.ensure_connected().await.map(|_| ())
    }

    /// Encode `event` as JSON and send it on `topic`.
    ///
    /// Blocks through the connect retry loop when no connection exists.
    /// Nothing is queued: a transport rejection is returned to the caller
    /// and the cached connection is dropped so the next call reconnects.
    pub async fn publish<T>(&self, topic: &str, event: &T) -> Result<(), ChannelError>
    where
        T: Serialize + ?Sized,
    {
        let payload = Bytes::from(serde_json::to_vec(event)?);
        let connection = self.ensure_connected().await?;
        match connection.publish(topic, payload).await {
            Ok(()) => {
                debug!(topic = %topic, "Event published");
                Ok(())
            }
            Err(e) => {
                self.invalidate(&connection).await;
                Err(e)
            }
        }
    }

    /// Start the subscription loop for `topic` as an owned task.
    ///
    /// The loop delivers messages to `handler` one at a time. Handler errors
    /// are logged and the loop continues; a bad message never stops later
    /// deliveries. The task runs until [`close`](Self::close).
    pub async fn subscribe(
        self: &Arc<Self>,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), ChannelError> {
        if *self.closed_tx.borrow() {
            return Err(ChannelError::Closed);
        }
        let channel = Arc::clone(self);
        let closed_rx = self.closed_tx.subscribe();
        let topic = topic.to_string();
        let task = tokio::spawn(async move {
            channel.run_subscription(topic, handler, closed_rx).await;
        });
        self.subscriptions.lock().await.push(task);
        Ok(())
    }

    /// Graceful drain: stop accepting deliveries, let in-flight handler
    /// invocations finish, then release the connection.
    ///
    /// Idempotent; a no-op on a never-connected channel.
    pub async fn close(&self) -> Result<(), ChannelError> {
        if self.closed_tx.send_replace(true) {
            return Ok(());
        }
        let tasks: Vec<JoinHandle<()>> = self.subscriptions.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Subscription task ended abnormally");
            }
        }
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.drain().await?;
            info!("Event bus connection drained");
        }
        Ok(())
    }

    /// Return the live connection, walking the retry loop if none exists.
    ///
    /// Fails only once the channel is closed.
    async fn ensure_connected(&self) -> Result<Arc<dyn BusConnection>, ChannelError> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }

        let mut closed_rx = self.closed_tx.subscribe();
        let mut attempt: u32 = 0;
        loop {
            if *self.closed_tx.borrow() {
                return Err(ChannelError::Closed);
            }
            attempt += 1;
            match self.transport.connect(&self.address).await {
                Ok(connection) => {
                    let connection: Arc<dyn BusConnection> = Arc::from(connection);
                    if *self.closed_tx.borrow() {
                        // Closed while the attempt was in flight.
                        let _ = connection.drain().await;
                        return Err(ChannelError::Closed);
                    }
                    info!(address = %self.address, attempt = attempt, "Event bus connected");
                    *slot = Some(Arc::clone(&connection));
                    return Ok(connection);
                }
                Err(e) => {
                    warn!(
                        address = %self.address,
                        attempt = attempt,
                        error = %e,
                        retry_in = ?self.policy.delay,
                        "Event bus connection failed"
                    );
                    tokio::select! {
                        biased;

                        _ = closed_rx.changed() => {
                            if *closed_rx.borrow() {
                                return Err(ChannelError::Closed);
                            }
                        }

                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }
                }
            }
        }
    }

    /// Drop the cached connection if it is still the one that failed.
    async fn invalidate(&self, stale: &Arc<dyn BusConnection>) {
        let mut slot = self.connection.lock().await;
        if let Some(current) = slot.as_ref() {
            if Arc::ptr_eq(current, stale) {
                *slot = None;
            }
        }
    }

    async fn run_subscription(
        &self,
        topic: String,
        handler: Arc<dyn EventHandler>,
        mut closed_rx: watch::Receiver<bool>,
    ) {
        'outer: loop {
            // Only fails once the channel is closed.
            let Ok(connection) = self.ensure_connected().await else {
                break;
            };

            let mut stream = match connection.subscribe(&topic).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Subscribe failed, rebuilding connection");
                    self.invalidate(&connection).await;
                    tokio::select! {
                        biased;

                        _ = closed_rx.changed() => {
                            if *closed_rx.borrow() {
                                break 'outer;
                            }
                        }

                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }
                    continue;
                }
            };

            info!(topic = %topic, "Subscribed");

            loop {
                tokio::select! {
                    biased;

                    _ = closed_rx.changed() => {
                        if *closed_rx.borrow() {
                            break 'outer;
                        }
                    }

                    message = stream.next() => {
                        match message {
                            Some(payload) => {
                                if let Err(e) = handler.handle(payload).await {
                                    warn!(topic = %topic, error = %e, "Handler failed, message dropped");
                                }
                            }
                            None => {
                                warn!(topic = %topic, "Subscription stream ended, resubscribing");
                                self.invalidate(&connection).await;
                                continue 'outer;
                            }
                        }
                    }
                }
            }
        }

        debug!(topic = %topic, "Subscription loop stopped");
    }
}
