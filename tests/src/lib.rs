//! # Core Interface Test Suite
//!
//! End-to-end flows through the whole stack, with the Core services played by
//! in-process responders on the in-memory broker.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Fake Core services, failing sessions
//! └── integration/
//!     ├── rpc_flows.rs  # RpcClient ↔ broker ↔ Core responders
//!     └── http_flows.rs # HTTP facade end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ci-tests
//! cargo test -p ci-tests integration::http_flows
//!
//! # Benchmarks
//! cargo bench -p ci-tests
//! ```

pub mod fixtures;
pub mod integration;
