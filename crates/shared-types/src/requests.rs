//! # Core Requests
//!
//! Bodies of the messages the Core Interface publishes. Search fields keep the
//! snake_case names the Search service expects; everything else is camelCase.

use crate::security::SecurityRequest;
use serde::{Deserialize, Serialize};

/// Attribute-based resource search, answered by the Search service.
///
/// All criteria are optional and combined with logical AND. Text criteria
/// accept `*` as a leading and/or trailing wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreQueryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_long: Option<f64>,
    /// Search radius around (`location_lat`, `location_long`) in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_property: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_property_iri: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_rank: Option<bool>,
    #[serde(rename = "securityRequest", skip_serializing_if = "Option::is_none")]
    pub security_request: Option<SecurityRequest>,
}

/// SPARQL search as sent by the end user over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparqlQueryRequest {
    pub sparql_query: String,
    /// Result serialization the Search service should produce (e.g. `SRX`, `JSON`, `TURTLE`).
    pub output_format: String,
}

/// SPARQL search forwarded to the Search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoreSparqlQueryRequest {
    /// The SPARQL query text.
    pub body: String,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_request: Option<SecurityRequest>,
}

impl CoreSparqlQueryRequest {
    /// Build the Core request from the user's SPARQL query.
    pub fn from_user_query(query: SparqlQueryRequest, security: SecurityRequest) -> Self {
        Self {
            body: query.sparql_query,
            output_format: query.output_format,
            security_request: Some(security),
        }
    }
}

/// Request for the access URLs of a set of resources, answered by the Core
/// Resource Access Monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUrlsRequest {
    /// Resource IDs to resolve.
    pub body: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_request: Option<SecurityRequest>,
}

impl ResourceUrlsRequest {
    pub fn new(ids: Vec<String>, security: Option<SecurityRequest>) -> Self {
        Self {
            body: ids,
            security_request: security,
        }
    }
}
