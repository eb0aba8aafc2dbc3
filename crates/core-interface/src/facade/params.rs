//! Search query-string parsing.
//!
//! Every search criterion is accepted under a snake_case and a camelCase name.
//! When both are sent the camelCase value is used. List criteria may repeat.

use shared_types::{CoreQueryRequest, SecurityRequest};
use std::str::FromStr;
use thiserror::Error;

/// A query-string value that does not parse as its criterion's type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for query parameter {name}: {value:?}")]
pub struct ParamError {
    pub name: &'static str,
    pub value: String,
}

/// Decoded query-string pairs, in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw `application/x-www-form-urlencoded` query string.
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of `name`, in request order.
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    fn either(&self, camel: &str, snake: &str) -> Option<String> {
        self.first(camel)
            .or_else(|| self.first(snake))
            .map(str::to_string)
    }

    fn either_parsed<T: FromStr>(
        &self,
        camel: &'static str,
        snake: &'static str,
    ) -> Result<Option<T>, ParamError> {
        let (name, value) = match (self.first(camel), self.first(snake)) {
            (Some(value), _) => (camel, value),
            (None, Some(value)) => (snake, value),
            (None, None) => return Ok(None),
        };
        value.trim().parse().map(Some).map_err(|_| ParamError {
            name,
            value: value.to_string(),
        })
    }

    /// Values of a repeatable criterion, decoded once more since clients
    /// commonly send pre-encoded property names.
    fn either_list(&self, camel: &str, snake: &str) -> Option<Vec<String>> {
        let values = match self.all(camel) {
            values if !values.is_empty() => values,
            _ => self.all(snake),
        };
        if values.is_empty() {
            return None;
        }
        Some(values.into_iter().map(decode_value).collect())
    }

    /// Build the Search request these parameters describe.
    pub fn to_core_query(&self, security: SecurityRequest) -> Result<CoreQueryRequest, ParamError> {
        Ok(CoreQueryRequest {
            platform_id: self.either("platformId", "platform_id"),
            platform_name: self.either("platformName", "platform_name"),
            owner: self.first("owner").map(str::to_string),
            name: self.first("name").map(str::to_string),
            id: self.first("id").map(str::to_string),
            description: self.first("description").map(str::to_string),
            location_name: self.either("locationName", "location_name"),
            location_lat: self.either_parsed("locationLatitude", "location_lat")?,
            location_long: self.either_parsed("locationLongitude", "location_long")?,
            max_distance: self.either_parsed("maxDistance", "max_distance")?,
            observed_property: self.either_list("observedProperty", "observed_property"),
            observed_property_iri: self.either_list("observedPropertyIri", "observed_property_iri"),
            resource_type: self.either("resourceType", "resource_type"),
            should_rank: self.either_parsed("shouldRank", "should_rank")?,
            security_request: Some(security),
        })
    }

    /// Resource IDs of a `/resourceUrls` request.
    pub fn resource_ids(&self) -> Vec<String> {
        self.all("id").into_iter().map(str::to_string).collect()
    }
}

fn decode_value(value: &str) -> String {
    let plus_as_space = value.replace('+', " ");
    match urlencoding::decode(&plus_as_space) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}
