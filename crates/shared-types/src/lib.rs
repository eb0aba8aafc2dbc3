//! # Shared Types Crate
//!
//! Request and response models for the symbIoTe Core services reached through
//! the broker, plus the security envelope every request carries.
//!
//! ## Design Principles
//!
//! - **Wire compatibility**: field names match what the Core services' JSON
//!   converters emit and expect, so these types decode replies verbatim.
//! - **One response shape per request**: every request type has exactly one
//!   response type; nothing here carries runtime type dispatch.
//! - **Lenient decoding**: absent fields default instead of failing, because
//!   the Core services omit `null` members.

pub mod entities;
pub mod errors;
pub mod requests;
pub mod responses;
pub mod security;

pub use entities::*;
pub use errors::*;
pub use requests::*;
pub use responses::*;
pub use security::*;
