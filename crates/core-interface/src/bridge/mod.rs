//! Broker bridge: publishes correlated requests and routes replies back to
//! the waiting callers.

pub mod client;
pub mod listener;
pub mod topology;

pub use client::RpcClient;
pub use listener::{ListenerStatus, ReplyDisposition, ReplyListener};
pub use topology::declare_topology;

/// `__ContentTypeId__` value the Core's JSON converters expect.
pub const CONTENT_TYPE_ID: &str = "java.lang.Object";
