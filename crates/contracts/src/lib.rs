//! # Contracts
//!
//! Shared interface contracts, defining inter-crate data structures.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `TelemetryEvent`: one decoded transport message
//! - `Resource` / `Link` / `Collection`: the remote hypermedia resource model
//! - `CollectorConfig`: process configuration schema

mod config;
mod error;
mod event;
mod resource;

pub use config::*;
pub use error::*;
pub use event::*;
pub use resource::*;
