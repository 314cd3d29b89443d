//! Remote hypermedia resource model
//!
//! A `Resource` is a fetched document: properties plus named relations.
//! A `Collection` is the flattened listing behind a relation, holding lazy
//! `Link`s that must be fetched to obtain the full resource.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lazy reference to a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,

    /// Display title, used to match devices and sensors by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: None,
        }
    }

    pub fn titled(href: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: Some(title.into()),
        }
    }
}

/// Fetched remote resource
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resource {
    /// Canonical (self) URL
    pub href: String,

    /// Properties, everything except hypermedia controls
    pub properties: Map<String, Value>,

    /// Relation name -> link
    pub links: HashMap<String, Link>,
}

impl Resource {
    /// Create an empty resource at `href`
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    /// Get a property value
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set a property value locally
    ///
    /// Nothing is sent until the resource is persisted.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Get a relation link
    pub fn link(&self, relation: &str) -> Option<&Link> {
        self.links.get(relation)
    }

    /// Builder-style relation insertion
    pub fn with_link(mut self, relation: impl Into<String>, link: Link) -> Self {
        self.links.insert(relation.into(), link);
        self
    }

    /// Human readable title
    ///
    /// The `name` property wins over the self link title.
    pub fn title(&self) -> Option<&str> {
        self.property("name")
            .and_then(Value::as_str)
            .or_else(|| self.link("self").and_then(|l| l.title.as_deref()))
    }
}

/// Flattened listing behind a collection relation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
    /// URL the collection was read from
    pub href: String,

    /// Member links in listing order
    pub items: Vec<Link>,

    /// Target for create requests
    pub create_href: String,
}

impl Collection {
    /// First member whose title equals `title`
    pub fn find_by_title(&self, title: &str) -> Option<&Link> {
        self.items
            .iter()
            .find(|link| link.title.as_deref() == Some(title))
    }
}
