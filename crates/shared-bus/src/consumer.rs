//! # Consumer
//!
//! Receiving side of a queue subscription. Every session implementation
//! feeds deliveries into the same channel-backed type, so consumers look
//! identical regardless of transport.

use crate::message::Delivery;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A stream of deliveries from one queue.
///
/// The stream ends when the consumer is cancelled, its queue is deleted, or
/// the session closes.
pub struct Consumer {
    tag: String,
    queue: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Consumer {
    /// Create a consumer over a delivery channel.
    pub fn new(tag: impl Into<String>, queue: impl Into<String>, receiver: mpsc::Receiver<Delivery>) -> Self {
        Self {
            tag: tag.into(),
            queue: queue.into(),
            receiver,
        }
    }

    /// Consumer tag this subscription was registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Queue being consumed.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Receive the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message
    /// - `None` - The subscription ended
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Receive without waiting; `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Consumer {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("tag", &self.tag)
            .field("queue", &self.queue)
            .finish()
    }
}
