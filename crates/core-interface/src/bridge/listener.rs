//! Reply Listener - the single consumer of the shared reply queue.
//!
//! Every reply addressed to this process lands on one queue. The listener
//! reads the correlation token from each message and hands the body to the
//! registry; it never decodes or waits on callers.

use crate::domain::correlation::CorrelationId;
use crate::domain::registry::CorrelationRegistry;
use shared_bus::{BrokerError, BrokerSession, Consumer, Delivery, QueueSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Consumer tag of the reply listener
pub const REPLY_CONSUMER_TAG: &str = "core-interface-reply-listener";

/// Shared flag telling clients whether replies can still be delivered.
#[derive(Debug, Clone, Default)]
pub struct ListenerStatus(Arc<AtomicBool>);

impl ListenerStatus {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }
}

/// Clears the status when the listener is dropped, however its run loop ends.
struct RunningGuard(ListenerStatus);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.set_running(false);
    }
}

/// What happened to one inbound reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDisposition {
    /// Handed to a waiting caller
    Resolved,
    /// Valid token, but nobody waits for it any more
    Stale,
    /// No correlation id in the metadata
    MissingToken,
    /// Correlation id this process could not have issued
    ForeignToken,
}

/// Consumer loop over the reply queue.
pub struct ReplyListener {
    session: Arc<dyn BrokerSession>,
    registry: Arc<CorrelationRegistry>,
    consumer: Consumer,
    reply_to: String,
    running: RunningGuard,
}

impl ReplyListener {
    /// Declare the reply queue and start consuming it.
    ///
    /// The consumer is registered when this returns, so any request
    /// published afterwards with [`Self::reply_to`] has a reader.
    pub async fn bind(
        session: Arc<dyn BrokerSession>,
        registry: Arc<CorrelationRegistry>,
        queue: &QueueSpec,
    ) -> Result<Self, BrokerError> {
        let reply_to = session.declare_queue(queue).await?;
        let consumer = session.consume(&reply_to, REPLY_CONSUMER_TAG).await?;

        let status = ListenerStatus::default();
        status.set_running(true);

        info!(reply_queue = %reply_to, "Reply listener bound");

        Ok(Self {
            session,
            registry,
            consumer,
            reply_to,
            running: RunningGuard(status),
        })
    }

    /// Name of the reply queue requests must carry in `reply_to`.
    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    pub fn status(&self) -> ListenerStatus {
        self.running.0.clone()
    }

    /// Route one delivery to its pending call.
    pub fn handle_delivery(&self, delivery: Delivery) -> ReplyDisposition {
        route_reply(&self.registry, delivery)
    }

    /// Run until `shutdown` fires or the consumer stream ends.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let Self {
            session,
            registry,
            mut consumer,
            reply_to,
            running,
        } = self;
        info!(reply_queue = %reply_to, "Reply listener started");

        let cancel_consumer = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Reply listener received shutdown signal");
                    break true;
                }
                delivery = consumer.recv() => match delivery {
                    Some(delivery) => {
                        let disposition = route_reply(&registry, delivery);
                        debug!(?disposition, "Reply handled");
                    }
                    None => {
                        warn!(reply_queue = %reply_to, "Reply consumer closed, stopping listener");
                        break false;
                    }
                },
            }
        };

        running.0.set_running(false);
        if cancel_consumer {
            if let Err(e) = session.cancel(consumer.tag()).await {
                warn!(error = %e, "Failed to cancel reply consumer");
            }
        }
        info!(reply_queue = %reply_to, "Reply listener stopped");
    }
}

fn route_reply(registry: &CorrelationRegistry, delivery: Delivery) -> ReplyDisposition {
    let Some(raw) = delivery.properties.correlation_id.as_deref() else {
        warn!(
            delivery_tag = delivery.delivery_tag,
            "Reply without correlation id, dropped"
        );
        return ReplyDisposition::MissingToken;
    };

    let token = match CorrelationId::parse(raw) {
        Ok(token) => token,
        Err(e) => {
            warn!(
                correlation_id = raw,
                error = %e,
                "Reply with unparsable correlation id, dropped"
            );
            return ReplyDisposition::ForeignToken;
        }
    };

    if registry.resolve(token, delivery.body) {
        ReplyDisposition::Resolved
    } else {
        ReplyDisposition::Stale
    }
}
