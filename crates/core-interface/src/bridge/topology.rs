//! Exchange declarations the Core services publish and consume on.

use crate::domain::config::InterfaceConfig;
use shared_bus::{BrokerError, BrokerSession};
use tracing::info;

/// Declare the resource and CRAM exchanges.
///
/// Redeclaring with the same flags is harmless, so this runs on every start.
pub async fn declare_topology(
    session: &dyn BrokerSession,
    config: &InterfaceConfig,
) -> Result<(), BrokerError> {
    for exchange in [&config.exchanges.resource, &config.exchanges.cram] {
        let spec = exchange.to_spec();
        session.declare_exchange(&spec).await?;
        info!(
            exchange = %spec.name,
            kind = spec.kind.as_str(),
            durable = spec.durable,
            "Exchange ready"
        );
    }
    Ok(())
}
