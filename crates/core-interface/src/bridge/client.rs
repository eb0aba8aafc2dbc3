//! RPC Client - request/reply over the broker.
//!
//! Each call registers a pending entry, publishes the request with its
//! correlation token and the shared reply queue attached, then waits for the
//! registry to hand over the reply or for the deadline to pass.

use crate::bridge::listener::{ListenerStatus, ReplyListener};
use crate::bridge::CONTENT_TYPE_ID;
use crate::domain::catalog::{CoreRequest, Destination, DispatchCatalog};
use crate::domain::correlation::CorrelationId;
use crate::domain::error::{RpcError, RpcResult};
use crate::domain::registry::{CallOutcome, CorrelationRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_bus::{
    BrokerSession, MessageProperties, CONTENT_TYPE_ID_HEADER, CONTENT_TYPE_JSON, TYPE_ID_HEADER,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument};

/// Stand-in deadline for timeouts too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Removes the registry entry on every exit path of a call.
///
/// A no-op when the entry was already taken by a reply or a timeout.
struct PendingGuard<'a> {
    registry: &'a CorrelationRegistry,
    token: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.registry.discard(&self.token);
    }
}

/// Synchronous-looking calls to the Core services.
///
/// Cheap to share behind an `Arc`; any number of tasks may call at once.
pub struct RpcClient {
    session: Arc<dyn BrokerSession>,
    registry: Arc<CorrelationRegistry>,
    catalog: Arc<DispatchCatalog>,
    reply_to: String,
    listener: ListenerStatus,
    /// Serializes publishes on the shared channel
    publish_lock: Mutex<()>,
}

impl RpcClient {
    /// Create a client replying through an already bound listener.
    ///
    /// Taking the listener here is what guarantees a consumer exists on the
    /// reply queue before the first publish.
    pub fn new(
        session: Arc<dyn BrokerSession>,
        registry: Arc<CorrelationRegistry>,
        catalog: Arc<DispatchCatalog>,
        listener: &ReplyListener,
    ) -> Self {
        Self {
            session,
            registry,
            catalog,
            reply_to: listener.reply_to().to_string(),
            listener: listener.status(),
            publish_lock: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &DispatchCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    /// Send a typed Core request to the destination its kind is cataloged
    /// under and decode the typed reply.
    pub async fn send<R: CoreRequest>(&self, request: &R) -> RpcResult<R::Response> {
        let entry = self.catalog.get(R::KIND)?;
        self.call_labelled(
            R::KIND.as_str(),
            &entry.destination,
            request,
            Some(entry.type_hint),
            entry.timeout,
        )
        .await
    }

    /// Send to the destination cataloged under a kind name, e.g. `"search"`.
    ///
    /// Unknown names fail before anything is published.
    pub async fn send_by_name<P, T>(&self, name: &str, payload: &P) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let entry = self.catalog.lookup_by_name(name)?;
        self.call_labelled(
            entry.kind.as_str(),
            &entry.destination,
            payload,
            Some(entry.type_hint),
            entry.timeout,
        )
        .await
    }

    /// Publish `payload` to `destination` and wait up to `timeout` for the
    /// reply, decoded as `T`.
    ///
    /// # Errors
    ///
    /// - `Timeout` - no reply before the deadline
    /// - `Decode` - the reply is not a valid `T`
    /// - `Transport` - the broker refused the publish; returned at once
    /// - `Encode` - `payload` could not be serialized
    /// - `ListenerStopped` - nobody reads the reply queue any more
    pub async fn call<P, T>(
        &self,
        destination: &Destination,
        payload: &P,
        type_hint: Option<&str>,
        timeout: Duration,
    ) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_labelled(&destination.routing_key, destination, payload, type_hint, timeout)
            .await
    }

    async fn call_labelled<P, T>(
        &self,
        label: &str,
        destination: &Destination,
        payload: &P,
        type_hint: Option<&str>,
        timeout: Duration,
    ) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = CorrelationId::new();
        let span = ci_telemetry::rpc_span!(label, token);
        self.exchange(token, label, destination, payload, type_hint, timeout)
            .instrument(span)
            .await
    }

    async fn exchange<P, T>(
        &self,
        token: CorrelationId,
        label: &str,
        destination: &Destination,
        payload: &P,
        type_hint: Option<&str>,
        timeout: Duration,
    ) -> RpcResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !self.listener.is_running() {
            return Err(RpcError::ListenerStopped);
        }

        let body = serde_json::to_vec(payload).map_err(|source| RpcError::Encode { source })?;

        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut reply =
            self.registry
                .register(token, label, std::any::type_name::<T>(), deadline)?;
        let _pending = PendingGuard {
            registry: &self.registry,
            token,
        };

        let mut properties = MessageProperties::default()
            .with_correlation_id(token.to_string())
            .with_reply_to(self.reply_to.as_str())
            .with_content_type(CONTENT_TYPE_JSON)
            .with_header(CONTENT_TYPE_ID_HEADER, CONTENT_TYPE_ID);
        if let Some(hint) = type_hint {
            properties = properties.with_header(TYPE_ID_HEADER, hint);
        }

        let publish = async {
            let _publish = self.publish_lock.lock().await;
            self.session
                .publish(
                    &destination.exchange,
                    &destination.routing_key,
                    properties,
                    body,
                )
                .await
        };
        match tokio::time::timeout_at(deadline, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    exchange = %destination.exchange,
                    routing_key = %destination.routing_key,
                    error = %e,
                    "Publish failed"
                );
                return Err(RpcError::Transport(e));
            }
            Err(_) => {
                self.registry.cancel(&token);
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    destination = %destination,
                    "Publish did not complete before the deadline"
                );
                return Err(RpcError::Timeout {
                    destination: destination.to_string(),
                    timeout,
                });
            }
        }
        debug!(
            exchange = %destination.exchange,
            routing_key = %destination.routing_key,
            timeout_ms = timeout.as_millis() as u64,
            "Request published"
        );

        let outcome = match tokio::time::timeout_at(deadline, &mut reply).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without an outcome
            Ok(Err(_)) => CallOutcome::TimedOut,
            Err(_) => {
                if self.registry.cancel(&token) {
                    CallOutcome::TimedOut
                } else {
                    // A reply won the race against the deadline
                    reply.try_recv().unwrap_or(CallOutcome::TimedOut)
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            CallOutcome::Reply(body) => serde_json::from_slice(&body).map_err(|source| {
                warn!(elapsed_ms, error = %source, "Reply could not be decoded");
                RpcError::Decode { source }
            }),
            CallOutcome::TimedOut => {
                warn!(elapsed_ms, destination = %destination, "RPC call timed out");
                Err(RpcError::Timeout {
                    destination: destination.to_string(),
                    timeout,
                })
            }
        }
    }
}
