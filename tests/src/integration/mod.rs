//! Cross-crate flows.

pub mod http_flows;
pub mod rpc_flows;
