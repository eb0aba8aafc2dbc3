//! # Security Envelope
//!
//! Every request forwarded to the Core carries the caller's security
//! credentials, lifted verbatim from the `x-auth-*` HTTP headers:
//!
//! - `x-auth-timestamp`: millisecond epoch timestamp of the request
//! - `x-auth-size`: number of credential headers that follow
//! - `x-auth-1` .. `x-auth-N`: one serialized credential each
//!
//! Validation of the credentials themselves happens inside the Core services;
//! this crate only checks that the envelope is structurally complete.

use crate::errors::SecurityHeaderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header carrying the request timestamp.
pub const SECURITY_TIMESTAMP_HEADER: &str = "x-auth-timestamp";

/// Header carrying the number of credentials.
pub const SECURITY_SIZE_HEADER: &str = "x-auth-size";

/// Prefix of the numbered credential headers (`x-auth-1`, `x-auth-2`, ...).
pub const SECURITY_CREDENTIALS_HEADER_PREFIX: &str = "x-auth-";

/// Header the Core's service response is returned in.
pub const SECURITY_RESPONSE_HEADER: &str = "x-auth-response";

/// Security credentials attached to every Core request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRequest {
    /// Millisecond epoch timestamp from `x-auth-timestamp`.
    pub timestamp: u64,
    /// Serialized credentials, in header order.
    #[serde(default)]
    pub security_credentials: Vec<String>,
}

impl SecurityRequest {
    /// Build the envelope from a lower-cased header map.
    ///
    /// A missing `x-auth-size` means no credentials (guest access).
    pub fn from_headers(headers: &HashMap<String, String>) -> Result<Self, SecurityHeaderError> {
        let raw_timestamp = headers
            .get(SECURITY_TIMESTAMP_HEADER)
            .ok_or(SecurityHeaderError::MissingTimestamp)?;
        let timestamp = raw_timestamp
            .trim()
            .parse::<u64>()
            .map_err(|_| SecurityHeaderError::InvalidTimestamp(raw_timestamp.clone()))?;

        let size = match headers.get(SECURITY_SIZE_HEADER) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| SecurityHeaderError::InvalidSize(raw.clone()))?,
            None => 0,
        };

        let security_credentials = (1..=size)
            .map(|index| {
                headers
                    .get(&format!("{SECURITY_CREDENTIALS_HEADER_PREFIX}{index}"))
                    .cloned()
                    .ok_or(SecurityHeaderError::MissingCredential { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            timestamp,
            security_credentials,
        })
    }

    /// Guest envelope with no credentials.
    pub fn guest(timestamp: u64) -> Self {
        Self {
            timestamp,
            security_credentials: Vec::new(),
        }
    }
}
