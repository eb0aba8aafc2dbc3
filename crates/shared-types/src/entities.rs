//! # Core Domain Entities
//!
//! Resources as returned by the Search service. A query result never carries
//! the resource's access URL; that comes from a separate `resource-urls` call.

use serde::{Deserialize, Serialize};

/// A registered resource as returned by a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResourceResult {
    /// symbIoTe ID of the platform the resource belongs to.
    pub platform_id: Option<String>,
    /// Name of the platform the resource belongs to.
    pub platform_name: Option<String>,
    /// Owner of the resource.
    pub owner: Option<String>,
    /// Resource name.
    pub name: Option<String>,
    /// symbIoTe ID of the resource.
    pub id: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Name of the resource's location.
    pub location_name: Option<String>,
    pub location_latitude: Option<f64>,
    pub location_longitude: Option<f64>,
    pub location_altitude: Option<f64>,
    /// Properties observed by the resource (sensors only).
    pub observed_properties: Vec<String>,
    /// Resource type IRIs.
    pub resource_type: Vec<String>,
    /// Ranking score, present when the query asked for ranking.
    pub ranking: Option<f64>,
}

impl QueryResourceResult {
    /// Resource with only its ID set.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}
