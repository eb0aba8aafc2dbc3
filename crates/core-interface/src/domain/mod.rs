//! Domain layer: the bridge's data model, configuration and error taxonomy.

pub mod catalog;
pub mod config;
pub mod correlation;
pub mod error;
pub mod registry;
