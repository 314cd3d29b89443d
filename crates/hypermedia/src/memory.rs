//! In-memory resource API
//!
//! Behaves like a small HAL server held in a map: a root with a devices
//! collection, and every created member gets its own child collections for
//! the configured relation names. Supports failure injection and call
//! counting for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{Collection, ContractError, Link, RelationNames, Resource};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::client::{HypermediaClient, Result};
use crate::hal::SELF_REL;

/// Root URL of every in-memory API
pub const MEMORY_ROOT_URL: &str = "mem://api";

/// In-memory client configuration
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
    /// Titles (`name` or `metric` attribute) whose creation fails
    pub fail_create_titles: Vec<String>,
    /// Every persist fails
    pub fail_persist: bool,
    /// Delay applied before every call, to simulate I/O suspension
    pub latency: Option<Duration>,
}

/// Number of calls per operation, failed calls included
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub get_root: usize,
    pub follow_relation: usize,
    pub open_collection: usize,
    pub fetch: usize,
    pub create: usize,
    pub persist: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// href -> resource
    resources: HashMap<String, Resource>,
    /// href -> member links
    collections: HashMap<String, Vec<Link>>,
    next_id: u64,
    calls: CallCounts,
}

#[derive(Debug)]
struct Shared {
    config: MemoryConfig,
    relations: RelationNames,
    state: Mutex<MemoryState>,
}

/// In-memory hypermedia client
///
/// Clones share the same API state.
#[derive(Debug, Clone)]
pub struct InMemoryHypermediaClient {
    shared: Arc<Shared>,
}

impl InMemoryHypermediaClient {
    /// Create an empty API using the default relation names
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self::with_relations(RelationNames::default(), config)
    }

    /// Create an empty API whose documents use `relations`
    pub fn with_relations(relations: RelationNames, config: MemoryConfig) -> Self {
        let devices_href = format!("{MEMORY_ROOT_URL}/devices");
        let root = Resource::new(MEMORY_ROOT_URL)
            .with_link(SELF_REL, Link::new(MEMORY_ROOT_URL))
            .with_link(relations.devices.clone(), Link::new(devices_href.clone()));

        let mut state = MemoryState::default();
        state.resources.insert(MEMORY_ROOT_URL.to_string(), root);
        state.collections.insert(devices_href, Vec::new());

        Self {
            shared: Arc::new(Shared {
                config,
                relations,
                state: Mutex::new(state),
            }),
        }
    }

    /// Href of the devices collection
    pub fn devices_href(&self) -> String {
        format!("{MEMORY_ROOT_URL}/devices")
    }

    /// Add a member directly, bypassing counters and failure injection
    pub fn seed(&self, collection_href: &str, attributes: Map<String, Value>) -> Result<Resource> {
        let mut state = self.state();
        self.insert_member(&mut state, collection_href, attributes)
    }

    /// Member links of a collection, in insertion order
    pub fn members(&self, collection_href: &str) -> Vec<Link> {
        self.state()
            .collections
            .get(collection_href)
            .cloned()
            .unwrap_or_default()
    }

    /// Current stored state of a resource
    pub fn resource(&self, href: &str) -> Option<Resource> {
        self.state().resources.get(href).cloned()
    }

    /// Stored resource behind the member titled `title`
    pub fn find_member(&self, collection_href: &str, title: &str) -> Option<Resource> {
        let state = self.state();
        let link = state
            .collections
            .get(collection_href)?
            .iter()
            .find(|link| link.title.as_deref() == Some(title))?;
        state.resources.get(&link.href).cloned()
    }

    /// Properties of every member of the collection behind `resource`'s `relation`
    pub fn member_properties(&self, resource: &Resource, relation: &str) -> Vec<Map<String, Value>> {
        let Some(link) = resource.link(relation) else {
            return Vec::new();
        };
        let state = self.state();
        state
            .collections
            .get(&link.href)
            .into_iter()
            .flatten()
            .filter_map(|member| state.resources.get(&member.href))
            .map(|member| member.properties.clone())
            .collect()
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn relations(&self) -> &RelationNames {
        &self.shared.relations
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.shared.config.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn insert_member(
        &self,
        state: &mut MemoryState,
        collection_href: &str,
        attributes: Map<String, Value>,
    ) -> Result<Resource> {
        if !state.collections.contains_key(collection_href) {
            return Err(ContractError::resource_api(
                "create",
                collection_href,
                "collection not found",
            ));
        }

        state.next_id += 1;
        let href = format!("{collection_href}/{}", state.next_id);
        let self_link = match member_title(&attributes) {
            Some(title) => Link::titled(href.clone(), title),
            None => Link::new(href.clone()),
        };

        let mut resource = Resource::new(href.clone()).with_link(SELF_REL, self_link.clone());
        resource.properties = attributes;

        let relations = &self.shared.relations;
        for (relation, suffix) in [(&relations.sensors, "sensors"), (&relations.data_history, "history")] {
            let child_href = format!("{href}/{suffix}");
            state.collections.insert(child_href.clone(), Vec::new());
            resource.links.insert(relation.clone(), Link::new(child_href));
        }

        if let Some(members) = state.collections.get_mut(collection_href) {
            members.push(self_link);
        }
        state.resources.insert(href, resource.clone());
        Ok(resource)
    }
}

impl Default for InMemoryHypermediaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HypermediaClient for InMemoryHypermediaClient {
    #[instrument(name = "memory_get_root", skip(self))]
    async fn get_root(&self, url: &str) -> Result<Resource> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.get_root += 1;
        state
            .resources
            .get(url)
            .cloned()
            .ok_or_else(|| ContractError::resource_api("get_root", url, "not found"))
    }

    #[instrument(name = "memory_follow_relation", skip(self, resource), fields(href = %resource.href))]
    async fn follow_relation(&self, resource: &Resource, relation: &str) -> Result<Collection> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.follow_relation += 1;
        list(&state, resource, relation)
    }

    #[instrument(name = "memory_open_collection", skip(self, resource), fields(href = %resource.href))]
    async fn open_collection(&self, resource: &Resource, relation: &str) -> Result<Collection> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.open_collection += 1;
        list(&state, resource, relation)
    }

    #[instrument(name = "memory_fetch", skip(self, link), fields(href = %link.href))]
    async fn fetch(&self, link: &Link) -> Result<Resource> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.fetch += 1;
        state
            .resources
            .get(&link.href)
            .cloned()
            .ok_or_else(|| ContractError::resource_api("fetch", link.href.as_str(), "not found"))
    }

    #[instrument(
        name = "memory_create",
        skip(self, collection, attributes),
        fields(href = %collection.create_href)
    )]
    async fn create(
        &self,
        collection: &Collection,
        attributes: &Map<String, Value>,
    ) -> Result<Resource> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.create += 1;

        if let Some(title) = member_title(attributes) {
            if self.shared.config.fail_create_titles.iter().any(|t| t == title) {
                return Err(ContractError::resource_api(
                    "create",
                    collection.create_href.as_str(),
                    format!("injected failure for '{title}'"),
                ));
            }
        }
        self.insert_member(&mut state, &collection.create_href, attributes.clone())
    }

    #[instrument(name = "memory_persist", skip(self, resource), fields(href = %resource.href))]
    async fn persist(&self, resource: &Resource) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.persist += 1;

        if self.shared.config.fail_persist {
            return Err(ContractError::resource_api(
                "persist",
                resource.href.as_str(),
                "injected failure",
            ));
        }
        let stored = state.resources.get_mut(&resource.href).ok_or_else(|| {
            ContractError::resource_api("persist", resource.href.as_str(), "not found")
        })?;
        stored.properties = resource.properties.clone();
        Ok(())
    }
}

/// Every member of the collection behind `resource`'s `relation`; never paged
fn list(state: &MemoryState, resource: &Resource, relation: &str) -> Result<Collection> {
    let link = resource
        .link(relation)
        .ok_or_else(|| ContractError::missing_relation(resource.href.as_str(), relation))?;
    let items = state
        .collections
        .get(&link.href)
        .cloned()
        .ok_or_else(|| ContractError::resource_api("list", link.href.as_str(), "not found"))?;

    Ok(Collection {
        href: link.href.clone(),
        items,
        create_href: link.href.clone(),
    })
}

/// Display title of a new member: devices are named, sensors carry a metric
fn member_title(attributes: &Map<String, Value>) -> Option<&str> {
    attributes
        .get("name")
        .or_else(|| attributes.get("metric"))
        .and_then(Value::as_str)
}
