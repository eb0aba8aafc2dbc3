// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Core Interface - synchronous HTTP entry point to the symbIoTe Core.
//!
//! The Core services (Search, Core Resource Access Monitor) only listen on a
//! topic-routed message broker. This crate turns each HTTP call into a
//! correlated request/reply exchange on that broker.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          CORE INTERFACE                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐                                                    │
//! │  │  HTTP facade │  /query  /sparqlQuery  /resourceUrls  /health      │
//! │  └──────┬───────┘                                                    │
//! │         │ CoreRequest                                                │
//! │  ┌──────┴──────────────┐      ┌─────────────────────────┐            │
//! │  │  Dispatch Catalog   │      │  Correlation Registry   │            │
//! │  │ kind → exchange/key │      │ token → oneshot sender  │            │
//! │  └──────┬──────────────┘      └──────▲──────────▲───────┘            │
//! │         │                     register│          │resolve            │
//! │  ┌──────┴─────────────────────────────┴─┐  ┌─────┴──────────┐        │
//! │  │              RPC Client              │  │ Reply Listener │        │
//! │  │  register → publish → await/deadline │  │  (one consumer)│        │
//! │  └──────────────────┬───────────────────┘  └─────▲──────────┘        │
//! └─────────────────────┼────────────────────────────┼───────────────────┘
//!                       │ publish                    │ reply_to queue
//!                       ▼                            │
//!                ┌────────────────────────────────────────┐
//!                │          Broker (BrokerSession)        │
//!                └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use core_interface::{CoreInterfaceService, InterfaceConfig};
//!
//! let config = InterfaceConfig::default();
//! let service = CoreInterfaceService::start(config, session).await?;
//! service.serve(shutdown_signal()).await?;
//! service.shutdown().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod domain;
pub mod facade;
pub mod service;

// Re-exports for public API
pub use bridge::{ListenerStatus, ReplyListener, RpcClient};
pub use domain::catalog::{CoreRequest, Destination, DispatchCatalog, DispatchEntry, RequestKind};
pub use domain::config::{ConfigError, ConnectPolicy, InterfaceConfig};
pub use domain::correlation::CorrelationId;
pub use domain::error::{RegistryError, RpcError, RpcResult};
pub use domain::registry::{CallOutcome, CorrelationRegistry, RegistrySnapshot};
pub use service::CoreInterfaceService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
