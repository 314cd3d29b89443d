//! HAL+JSON document parsing
//!
//! Hypermedia controls live under `_links`; everything else is a property.
//! Collections list their members in `_links.items`, advertise the create
//! target as `_links.createForm` and continue on `_links.next`.

use contracts::{ContractError, Link, Resource};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::client::Result;

const LINKS_KEY: &str = "_links";
const EMBEDDED_KEY: &str = "_embedded";

pub const SELF_REL: &str = "self";
pub const ITEMS_REL: &str = "items";
pub const NEXT_REL: &str = "next";
pub const CREATE_FORM_REL: &str = "createForm";

/// One page of a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPage {
    /// Self href, or the URL the page was read from
    pub href: String,
    pub items: Vec<Link>,
    pub next: Option<String>,
    pub create_href: Option<String>,
}

/// Parse a resource document read from `base`
pub fn parse_resource(base: &Url, body: Value) -> Result<Resource> {
    let (mut properties, links) = split_document(base, body)?;
    properties.remove(EMBEDDED_KEY);

    let mut resource = Resource::new(base.as_str());
    resource.properties = properties;

    for (relation, value) in links {
        // Repeated relations: only the first link is navigable
        let entry = match &value {
            Value::Array(entries) => entries.first(),
            other => Some(other),
        };
        if let Some(link) = entry.and_then(|v| parse_link(base, v)) {
            resource.links.insert(relation, link);
        }
    }

    if let Some(self_link) = resource.links.get(SELF_REL) {
        resource.href = self_link.href.clone();
    }
    Ok(resource)
}

/// Parse one page of a collection read from `base`
pub fn parse_collection_page(base: &Url, body: Value) -> Result<CollectionPage> {
    let (_, links) = split_document(base, body)?;

    let items = match links.get(ITEMS_REL) {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| parse_link(base, entry))
            .collect(),
        Some(single) => parse_link(base, single).into_iter().collect(),
        None => Vec::new(),
    };

    let href_of = |relation: &str| {
        links
            .get(relation)
            .and_then(|v| parse_link(base, v))
            .map(|link| link.href)
    };

    Ok(CollectionPage {
        href: href_of(SELF_REL).unwrap_or_else(|| base.to_string()),
        items,
        next: href_of(NEXT_REL),
        create_href: href_of(CREATE_FORM_REL),
    })
}

/// Resolve a possibly relative href against the document URL
pub fn resolve_href(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn split_document(base: &Url, body: Value) -> Result<(Map<String, Value>, Map<String, Value>)> {
    let Value::Object(mut object) = body else {
        return Err(ContractError::malformed(
            base.as_str(),
            "expected a JSON object",
        ));
    };

    let links = match object.remove(LINKS_KEY) {
        Some(Value::Object(links)) => links,
        Some(_) => {
            return Err(ContractError::malformed(
                base.as_str(),
                "'_links' must be an object",
            ))
        }
        None => Map::new(),
    };
    Ok((object, links))
}

fn parse_link(base: &Url, value: &Value) -> Option<Link> {
    let href = value.get("href")?.as_str()?;
    Some(Link {
        href: resolve_href(base, href),
        title: value.get("title").and_then(Value::as_str).map(String::from),
    })
}
