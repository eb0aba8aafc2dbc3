//! Dispatch Catalog - request kind to broker destination.
//!
//! Built once from configuration and read-only afterwards. Each request kind
//! has exactly one destination and one statically known response type, so
//! replies never need runtime type dispatch.

use crate::domain::config::InterfaceConfig;
use crate::domain::error::RpcError;
use serde::{Deserialize, Serialize};
use shared_types::{
    CoreQueryRequest, CoreSparqlQueryRequest, QueryResponse, ResourceUrlsRequest,
    ResourceUrlsResponse, ServiceResponse, SparqlQueryResponse,
};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Logical request kinds served by the Core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Attribute search over registered resources
    Search,
    /// SPARQL query over the semantic registry
    SparqlSearch,
    /// Access URLs for a set of resource ids
    ResourceUrls,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [Self::Search, Self::SparqlSearch, Self::ResourceUrls];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::SparqlSearch => "sparql-search",
            Self::ResourceUrls => "resource-urls",
        }
    }

    /// Payload type name the Core's JSON converter expects in `__TypeId__`.
    pub fn type_hint(&self) -> &'static str {
        match self {
            Self::Search => "eu.h2020.symbiote.core.internal.CoreQueryRequest",
            Self::SparqlSearch => "eu.h2020.symbiote.core.internal.CoreSparqlQueryRequest",
            Self::ResourceUrls => "eu.h2020.symbiote.core.internal.cram.ResourceUrlsRequest",
        }
    }

    /// Name of the expected reply type.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::Search => "QueryResponse",
            Self::SparqlSearch => "SparqlQueryResponse",
            Self::ResourceUrls => "ResourceUrlsResponse",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RpcError::UnknownRequestKind(s.to_string()))
    }
}

/// Where a request is published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub exchange: String,
    pub routing_key: String,
}

impl Destination {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exchange, self.routing_key)
    }
}

/// One row of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    pub kind: RequestKind,
    pub destination: Destination,
    pub type_hint: &'static str,
    pub response_type: &'static str,
    pub timeout: Duration,
}

/// Static table of request kind → destination and response shape.
#[derive(Debug, Clone, Default)]
pub struct DispatchCatalog {
    entries: HashMap<RequestKind, DispatchEntry>,
}

impl DispatchCatalog {
    /// Build the full catalog from configuration.
    pub fn from_config(config: &InterfaceConfig) -> Self {
        let exchange_of = |kind: RequestKind| match kind {
            RequestKind::Search | RequestKind::SparqlSearch => &config.exchanges.resource.name,
            RequestKind::ResourceUrls => &config.exchanges.cram.name,
        };

        let entries = RequestKind::ALL
            .into_iter()
            .map(|kind| {
                let entry = DispatchEntry {
                    kind,
                    destination: Destination::new(
                        exchange_of(kind).as_str(),
                        config.routing_keys.for_kind(kind),
                    ),
                    type_hint: kind.type_hint(),
                    response_type: kind.response_type(),
                    timeout: config.timeouts.for_kind(kind),
                };
                (kind, entry)
            })
            .collect();

        Self { entries }
    }

    /// Catalog with only the given entries.
    pub fn with_entries(entries: impl IntoIterator<Item = DispatchEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.kind, e)).collect(),
        }
    }

    pub fn get(&self, kind: RequestKind) -> Result<&DispatchEntry, RpcError> {
        self.entries
            .get(&kind)
            .ok_or_else(|| RpcError::UnknownRequestKind(kind.to_string()))
    }

    /// Look up by kind name, e.g. `"sparql-search"`.
    pub fn lookup_by_name(&self, name: &str) -> Result<&DispatchEntry, RpcError> {
        self.get(name.parse()?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A typed request bound to its kind and its reply type.
pub trait CoreRequest: Serialize + Send + Sync {
    const KIND: RequestKind;
    type Response: ServiceResponse;
}

impl CoreRequest for CoreQueryRequest {
    const KIND: RequestKind = RequestKind::Search;
    type Response = QueryResponse;
}

impl CoreRequest for CoreSparqlQueryRequest {
    const KIND: RequestKind = RequestKind::SparqlSearch;
    type Response = SparqlQueryResponse;
}

impl CoreRequest for ResourceUrlsRequest {
    const KIND: RequestKind = RequestKind::ResourceUrls;
    type Response = ResourceUrlsResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = DispatchCatalog::from_config(&InterfaceConfig::default());
        assert_eq!(catalog.len(), 3);

        let search = catalog.get(RequestKind::Search).unwrap();
        assert_eq!(
            search.destination,
            Destination::new("symbIoTe.resource", "symbIoTe.resource.search")
        );
        assert_eq!(
            search.type_hint,
            "eu.h2020.symbiote.core.internal.CoreQueryRequest"
        );
        assert_eq!(search.timeout, Duration::from_secs(20));

        let urls = catalog.get(RequestKind::ResourceUrls).unwrap();
        assert_eq!(urls.destination.exchange, "symbIoTe.CoreResourceAccessMonitor");
        assert_eq!(
            urls.destination.routing_key,
            "symbIoTe.CoreResourceAccessMonitor.coreAPI.get_resource_urls"
        );
    }

    #[test]
    fn test_per_kind_timeout() {
        let mut config = InterfaceConfig::default();
        config.timeouts.sparql_search = Some(Duration::from_secs(60));
        let catalog = DispatchCatalog::from_config(&config);

        assert_eq!(
            catalog.get(RequestKind::SparqlSearch).unwrap().timeout,
            Duration::from_secs(60)
        );
        assert_eq!(
            catalog.get(RequestKind::Search).unwrap().timeout,
            Duration::from_secs(20)
        );
    }

    #[test]
    fn test_lookup_by_name() {
        let catalog = DispatchCatalog::from_config(&InterfaceConfig::default());
        let entry = catalog.lookup_by_name("sparql-search").unwrap();
        assert_eq!(entry.kind, RequestKind::SparqlSearch);
        assert_eq!(entry.destination.routing_key, "symbIoTe.resource.sparqlSearch");
    }

    #[test]
    fn test_unknown_name_fails_immediately() {
        let catalog = DispatchCatalog::from_config(&InterfaceConfig::default());
        let err = catalog.lookup_by_name("getWeather").unwrap_err();
        assert!(matches!(err, RpcError::UnknownRequestKind(name) if name == "getWeather"));
    }

    #[test]
    fn test_missing_entry() {
        let full = DispatchCatalog::from_config(&InterfaceConfig::default());
        let partial = DispatchCatalog::with_entries(full.get(RequestKind::Search).cloned());

        assert!(partial.get(RequestKind::Search).is_ok());
        assert!(matches!(
            partial.get(RequestKind::ResourceUrls),
            Err(RpcError::UnknownRequestKind(_))
        ));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn test_request_types_are_bound_to_kinds() {
        assert_eq!(CoreQueryRequest::KIND, RequestKind::Search);
        assert_eq!(CoreSparqlQueryRequest::KIND, RequestKind::SparqlSearch);
        assert_eq!(ResourceUrlsRequest::KIND, RequestKind::ResourceUrls);
    }
}
