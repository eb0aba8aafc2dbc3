//! # Core Responses
//!
//! Every Core reply is a status envelope: an HTTP-like `status`, a human
//! readable `message`, the typed `body`, and an optional `serviceResponse`
//! the caller uses to authenticate the Core.

use crate::entities::QueryResourceResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_status() -> u16 {
    200
}

/// Common accessors of the Core status envelope.
pub trait ServiceResponse: Serialize + DeserializeOwned + Send + 'static {
    /// Status reported by the Core service.
    fn status(&self) -> u16;

    /// Human readable status message.
    fn message(&self) -> Option<&str>;

    /// Service response token, if the Core attached one.
    fn service_response(&self) -> Option<&str>;

    /// Envelope with no body, used when the Core could not be reached.
    fn failure(status: u16, message: impl Into<String>) -> Self;
}

macro_rules! status_envelope {
    ($(#[$meta:meta])* $name:ident, $body:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            #[serde(default = "default_status")]
            pub status: u16,
            #[serde(default)]
            pub message: Option<String>,
            #[serde(default)]
            pub body: Option<$body>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub service_response: Option<String>,
        }

        impl $name {
            /// Successful envelope carrying `body`.
            pub fn ok(body: $body) -> Self {
                Self {
                    status: default_status(),
                    message: Some("OK".to_string()),
                    body: Some(body),
                    service_response: None,
                }
            }
        }

        impl ServiceResponse for $name {
            fn status(&self) -> u16 {
                self.status
            }

            fn message(&self) -> Option<&str> {
                self.message.as_deref()
            }

            fn service_response(&self) -> Option<&str> {
                self.service_response.as_deref()
            }

            fn failure(status: u16, message: impl Into<String>) -> Self {
                Self {
                    status,
                    message: Some(message.into()),
                    body: None,
                    service_response: None,
                }
            }
        }
    };
}

status_envelope!(
    /// Reply to [`crate::CoreQueryRequest`].
    QueryResponse,
    Vec<QueryResourceResult>
);

status_envelope!(
    /// Reply to [`crate::CoreSparqlQueryRequest`]; the body is the query
    /// result rendered in the requested output format.
    SparqlQueryResponse,
    String
);

status_envelope!(
    /// Reply to [`crate::ResourceUrlsRequest`]: resource ID to access URL.
    ResourceUrlsResponse,
    HashMap<String, String>
);
