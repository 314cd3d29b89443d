//! Resource API client abstraction
//!
//! The ingestion side only ever navigates: start at the root, follow a
//! relation to a collection, fetch a member, create a member, or write a
//! resource's properties back.

use std::future::Future;

use contracts::{Collection, ContractError, Link, Resource};
use serde_json::{Map, Value};

pub type Result<T> = std::result::Result<T, ContractError>;

/// Hypermedia client trait
///
/// Implemented by the HTTP adapter and the in-memory adapter used in tests.
pub trait HypermediaClient: Send + Sync {
    /// Fetch the API entry point
    fn get_root(&self, url: &str) -> impl Future<Output = Result<Resource>> + Send;

    /// Follow a collection relation of `resource`
    ///
    /// Paged listings are flattened into one `Collection`.
    fn follow_relation(
        &self,
        resource: &Resource,
        relation: &str,
    ) -> impl Future<Output = Result<Collection>> + Send;

    /// Open a collection relation of `resource` for creating members
    ///
    /// Reads only the first page: `items` holds that page's members and
    /// `create_href` honours the page's create form.
    fn open_collection(
        &self,
        resource: &Resource,
        relation: &str,
    ) -> impl Future<Output = Result<Collection>> + Send;

    /// Fetch the full resource behind a link
    fn fetch(&self, link: &Link) -> impl Future<Output = Result<Resource>> + Send;

    /// Create a member of `collection` from `attributes`
    ///
    /// # Returns
    /// The created resource, including its relations
    fn create(
        &self,
        collection: &Collection,
        attributes: &Map<String, Value>,
    ) -> impl Future<Output = Result<Resource>> + Send;

    /// Write the resource's current properties back to the API
    fn persist(&self, resource: &Resource) -> impl Future<Output = Result<()>> + Send;
}
