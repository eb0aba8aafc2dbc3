//! # Broker Errors

use thiserror::Error;

/// Errors surfaced by a [`crate::BrokerSession`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Could not establish the broker connection.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// The connection or channel is closed.
    #[error("broker connection closed")]
    ConnectionClosed,

    /// Publish or bind against an undeclared exchange.
    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),

    /// Consume, bind or delete against an undeclared queue.
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// Cancel of a consumer tag that is not registered.
    #[error("consumer not found: {0}")]
    ConsumerNotFound(String),

    /// Exclusive queue already consumed, or redeclared with other flags.
    #[error("resource locked: {0}")]
    ResourceLocked(String),

    /// The broker rejected the operation.
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// True when the session is unusable and must be reconnected.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectionClosed)
    }
}
