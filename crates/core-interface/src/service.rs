//! Core Interface service - wires the bridge to the HTTP facade.

use crate::bridge::{declare_topology, ListenerStatus, ReplyListener, RpcClient};
use crate::domain::catalog::DispatchCatalog;
use crate::domain::config::InterfaceConfig;
use crate::domain::error::InterfaceError;
use crate::domain::registry::{sweep_task, CorrelationRegistry};
use crate::facade::{self, AppState};
use axum::Router;
use shared_bus::BrokerSession;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A running Core Interface: reply listener bound, expiry sweep active,
/// ready to serve HTTP.
pub struct CoreInterfaceService {
    config: InterfaceConfig,
    session: Arc<dyn BrokerSession>,
    client: Arc<RpcClient>,
    registry: Arc<CorrelationRegistry>,
    listener_status: ListenerStatus,
    listener_stop: Option<oneshot::Sender<()>>,
    listener_task: Option<JoinHandle<()>>,
    sweep: JoinHandle<()>,
}

impl CoreInterfaceService {
    /// Declare topology, bind the reply listener and build the client.
    ///
    /// Returns only once replies can be received, so the service may accept
    /// calls immediately.
    pub async fn start(
        config: InterfaceConfig,
        session: Arc<dyn BrokerSession>,
    ) -> Result<Self, InterfaceError> {
        config.validate()?;

        declare_topology(session.as_ref(), &config).await?;

        let registry = Arc::new(CorrelationRegistry::new());
        let listener = ReplyListener::bind(
            Arc::clone(&session),
            Arc::clone(&registry),
            &config.reply_queue_spec(),
        )
        .await?;

        let catalog = Arc::new(DispatchCatalog::from_config(&config));
        let client = Arc::new(RpcClient::new(
            Arc::clone(&session),
            Arc::clone(&registry),
            catalog,
            &listener,
        ));
        let listener_status = listener.status();

        let (listener_stop, shutdown) = oneshot::channel();
        let listener_task = tokio::spawn(listener.run(shutdown));
        let sweep = tokio::spawn(sweep_task(
            Arc::clone(&registry),
            config.timeouts.sweep_interval,
        ));

        info!(
            reply_queue = %client.reply_to(),
            "Core Interface started"
        );

        Ok(Self {
            config,
            session,
            client,
            registry,
            listener_status,
            listener_stop: Some(listener_stop),
            listener_task: Some(listener_task),
            sweep,
        })
    }

    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }

    pub fn registry(&self) -> Arc<CorrelationRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn listener_status(&self) -> ListenerStatus {
        self.listener_status.clone()
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// HTTP router over this service's client.
    pub fn router(&self) -> Router {
        facade::router(AppState::new(
            Arc::clone(&self.client),
            self.listener_status.clone(),
        ))
    }

    /// Serve HTTP on the configured address until `shutdown` completes.
    pub async fn serve<F>(&self, shutdown: F) -> Result<(), InterfaceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.config.http.enabled {
            info!("HTTP server disabled");
            shutdown.await;
            return Ok(());
        }

        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| InterfaceError::Bind(format!("{addr}: {e}")))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve HTTP on an already bound socket until `shutdown` completes.
    pub async fn serve_on<F>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), InterfaceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| InterfaceError::Bind(e.to_string()))?;
        info!(addr = %addr, "Starting HTTP server");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| InterfaceError::Internal(format!("HTTP server error: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Stop the reply listener and the sweep, then close the session.
    ///
    /// Calls still in flight fail with `ListenerStopped` or time out.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.listener_stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.listener_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Reply listener task failed");
            }
        }
        self.sweep.abort();

        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Failed to close broker session");
        }
        info!("Core Interface stopped");
    }
}
