//! # Error Types
//!
//! Errors raised while building the security envelope from request headers.

use thiserror::Error;

/// Errors that can occur when reading security headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityHeaderError {
    /// `x-auth-timestamp` header absent.
    #[error("missing security header: x-auth-timestamp")]
    MissingTimestamp,

    /// `x-auth-timestamp` is not a millisecond epoch timestamp.
    #[error("invalid x-auth-timestamp: {0}")]
    InvalidTimestamp(String),

    /// `x-auth-size` is not a non-negative integer.
    #[error("invalid x-auth-size: {0}")]
    InvalidSize(String),

    /// `x-auth-size` announced more credentials than were sent.
    #[error("missing security credential header: x-auth-{index}")]
    MissingCredential { index: usize },
}
