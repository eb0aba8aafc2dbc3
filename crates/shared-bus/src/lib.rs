//! # Shared Bus - Broker Session for Request/Reply Messaging
//!
//! The Core Interface talks to the symbIoTe Core exclusively through a
//! topic-routed message broker. This crate is the only place that knows how
//! a broker works; everything above it sees a [`BrokerSession`].
//!
//! ## Routing Model
//!
//! ```text
//!  publish(exchange, routing_key)
//!            │
//!            ▼
//!   ┌─────────────────┐   binding pattern    ┌──────────────┐
//!   │    Exchange     │ ───────────────────▶ │    Queue     │ ──▶ Consumer
//!   │ (topic/direct/  │   e.g. resource.#    │              │
//!   │     fanout)     │                      └──────────────┘
//!   └─────────────────┘
//! ```
//!
//! Messages published to the default exchange (`""`) go straight to the queue
//! named by the routing key, which is how replies reach a `reply_to` queue.
//!
//! ## Implementations
//!
//! - [`InMemoryBroker`]: in-process broker for tests and standalone mode
//! - `AmqpSession` (feature `amqp`): RabbitMQ over AMQP 0-9-1 via `lapin`

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod session;

// Re-export main types
#[cfg(feature = "amqp")]
pub use amqp::AmqpSession;
pub use consumer::Consumer;
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use message::{Delivery, ExchangeKind, ExchangeSpec, MessageProperties, QueueSpec};
pub use session::BrokerSession;

/// Name of the default (nameless) exchange.
pub const DEFAULT_EXCHANGE: &str = "";

/// Content type of every message body exchanged with the Core.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Header naming the payload type, read by the responder's JSON converter.
pub const TYPE_ID_HEADER: &str = "__TypeId__";

/// Header naming the content container type.
pub const CONTENT_TYPE_ID_HEADER: &str = "__ContentTypeId__";

/// Maximum deliveries buffered per consumer before backpressure.
pub const DEFAULT_CONSUMER_CAPACITY: usize = 1000;
