//! # Core Interface Runtime
//!
//! Process-level wiring: configuration loading, broker connection and the
//! lifetime of the [`CoreInterfaceService`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `CI_*` environment overrides)
//! 2. Connect to the broker, retrying per the connect policy
//! 3. Declare topology and bind the reply listener
//! 4. Serve HTTP until shutdown is signalled
//! 5. Stop the listener and close the broker session

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use core_interface::{ConnectPolicy, CoreInterfaceService, InterfaceConfig};
use shared_bus::{BrokerError, BrokerSession, InMemoryBroker};
use tracing::{info, warn};

/// Which broker the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// In-process broker; no Core service is reachable.
    Standalone,
    /// AMQP broker at the configured URI.
    Amqp,
}

/// Load configuration from `path` (defaults when absent) and apply the
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<InterfaceConfig> {
    let mut config = match path {
        Some(path) => InterfaceConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => InterfaceConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run `connect` until it succeeds or the policy gives up.
///
/// Only connection-level failures are retried; anything else is returned
/// at once. `connect` receives the 1-based attempt number.
pub async fn connect_with_retry<S, F, Fut>(
    policy: &ConnectPolicy,
    mut connect: F,
) -> Result<S, BrokerError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<S, BrokerError>>,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 1;
    loop {
        match connect(attempt).await {
            Ok(session) => return Ok(session),
            Err(e) if e.is_connection_error() && attempt < max_attempts => {
                let delay = policy.backoff(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Broker connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open the broker session for `transport`.
pub async fn open_session(
    config: &InterfaceConfig,
    transport: Transport,
) -> Result<Arc<dyn BrokerSession>> {
    info!(?transport, "Opening broker session");
    match transport {
        Transport::Standalone => {
            warn!("Running standalone: calls to the Core will time out");
            Ok(Arc::new(InMemoryBroker::new()))
        }
        Transport::Amqp => open_amqp(config).await,
    }
}

#[cfg(feature = "amqp")]
async fn open_amqp(config: &InterfaceConfig) -> Result<Arc<dyn BrokerSession>> {
    let broker = &config.broker;
    let session = connect_with_retry(&broker.connect_policy, |attempt| {
        info!(attempt, "Connecting to broker");
        shared_bus::AmqpSession::connect(&broker.uri, broker.publish_confirms)
    })
    .await
    .context("Failed to connect to the broker")?;
    info!("Connected to broker");
    Ok(Arc::new(session))
}

#[cfg(not(feature = "amqp"))]
async fn open_amqp(_config: &InterfaceConfig) -> Result<Arc<dyn BrokerSession>> {
    anyhow::bail!("built without the `amqp` feature; rebuild with it or pass --standalone")
}

/// Start the service on `session` and serve until `shutdown` completes.
pub async fn run<F>(
    config: InterfaceConfig,
    session: Arc<dyn BrokerSession>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let service = CoreInterfaceService::start(config, session)
        .await
        .context("Failed to start the Core Interface")?;

    let served = service.serve(shutdown).await;
    service.shutdown().await;
    served.context("HTTP server failed")
}
