//! Error taxonomy of the bridge and the service around it.
//!
//! Every outcome of an RPC call other than success is one [`RpcError`]
//! variant; nothing in the bridge panics or aborts the process.

use crate::domain::config::ConfigError;
use crate::domain::correlation::CorrelationId;
use shared_bus::BrokerError;
use std::time::Duration;
use thiserror::Error;

/// Result type for bridge calls
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors from the correlation registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A pending call already holds this token.
    #[error("correlation token already registered: {0}")]
    DuplicateToken(CorrelationId),
}

/// Outcome of a failed RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No reply observed before the deadline.
    #[error("no reply from {destination} within {}ms", timeout.as_millis())]
    Timeout {
        destination: String,
        timeout: Duration,
    },

    /// A reply arrived but does not match the expected response shape.
    #[error("malformed reply: {source}")]
    Decode { source: serde_json::Error },

    /// The broker could not accept the request.
    #[error("broker transport failure: {0}")]
    Transport(#[from] BrokerError),

    /// The request payload could not be encoded.
    #[error("failed to encode request: {source}")]
    Encode { source: serde_json::Error },

    /// No catalog entry for the requested kind.
    #[error("unknown request kind: {0}")]
    UnknownRequestKind(String),

    /// Token collision in the registry.
    #[error("correlation token already registered: {0}")]
    DuplicateToken(CorrelationId),

    /// The reply listener is gone, so no reply could ever be delivered.
    #[error("reply listener is not running")]
    ListenerStopped,
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status the facade answers with.
    ///
    /// Unavailability of the Core maps to 504, contract mismatches to 500 and
    /// caller mistakes to 400.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Timeout { .. } | Self::Transport(_) | Self::ListenerStopped => 504,
            Self::Decode { .. } | Self::Encode { .. } | Self::DuplicateToken(_) => 500,
            Self::UnknownRequestKind(_) => 400,
        }
    }
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateToken(token) => Self::DuplicateToken(token),
        }
    }
}

/// Service-level errors (startup, serving, shutdown)
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Broker setup failed
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
