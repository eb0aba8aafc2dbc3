//! # Broker Session
//!
//! The single interface the rest of the workspace uses to reach the broker.
//! One session wraps one logical connection and is shared by every caller in
//! the process.

use crate::consumer::Consumer;
use crate::error::BrokerError;
use crate::message::{ExchangeSpec, MessageProperties, QueueSpec};
use async_trait::async_trait;

/// Operations on a broker connection.
///
/// Implementations must be safe to share across tasks. Whether concurrent
/// publishes are safe on the underlying transport is NOT assumed; callers that
/// publish from many tasks serialize publishes themselves.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Declare an exchange. Redeclaring with identical flags is a no-op.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError>;

    /// Declare a queue and return its name (generated when `spec.name` is empty).
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String, BrokerError>;

    /// Route messages matching `routing_key` on `exchange` into `queue`.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Publish a message. Unroutable messages are dropped by the broker, not
    /// reported as errors.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError>;

    /// Start consuming `queue` under `consumer_tag` (auto-ack).
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BrokerError>;

    /// Stop the consumer registered under `consumer_tag`.
    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError>;

    /// Close the connection. Every consumer stream ends.
    async fn close(&self) -> Result<(), BrokerError>;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;
}
