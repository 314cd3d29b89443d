//! # Hypermedia
//!
//! Client side of the remote resource API.
//!
//! - [`HypermediaClient`]: navigation trait (root, relations, fetch, create, persist)
//! - [`HttpHypermediaClient`]: HAL+JSON over HTTP (reqwest)
//! - [`InMemoryHypermediaClient`]: in-process API for tests, with failure injection

pub mod client;
pub mod hal;
pub mod http;
pub mod memory;

pub use client::{HypermediaClient, Result};
pub use http::HttpHypermediaClient;
pub use memory::{CallCounts, InMemoryHypermediaClient, MemoryConfig, MEMORY_ROOT_URL};
