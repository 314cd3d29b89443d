//! HTTP adapter speaking HAL+JSON

use std::collections::HashSet;
use std::time::Duration;

use contracts::{Collection, ContractError, Link, Resource, ResourceApiConfig};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Response, Url};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::client::{HypermediaClient, Result};
use crate::hal;

const HAL_ACCEPT: &str = "application/hal+json, application/json";

/// Resource API client over HTTP
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpHypermediaClient {
    http: reqwest::Client,
}

impl HttpHypermediaClient {
    /// Build a client with the configured request timeout
    pub fn new(config: &ResourceApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("telemetry-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ContractError::resource_api("connect", config.url.as_str(), e.to_string()))?;
        Ok(Self { http })
    }

    async fn get_document(&self, operation: &'static str, href: &str) -> Result<(Url, Value)> {
        let url = parse_url(operation, href)?;
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, HAL_ACCEPT)
            .send()
            .await
            .map_err(|e| request_error(operation, href, e))?;
        let body = read_body(operation, &url, response).await?;
        Ok((url, body))
    }
}

impl HypermediaClient for HttpHypermediaClient {
    #[instrument(name = "hypermedia_get_root", skip(self))]
    async fn get_root(&self, url: &str) -> Result<Resource> {
        let (url, body) = self.get_document("get_root", url).await?;
        hal::parse_resource(&url, body)
    }

    #[instrument(
        name = "hypermedia_follow_relation",
        skip(self, resource),
        fields(href = %resource.href)
    )]
    async fn follow_relation(&self, resource: &Resource, relation: &str) -> Result<Collection> {
        let link = resource
            .link(relation)
            .ok_or_else(|| ContractError::missing_relation(resource.href.as_str(), relation))?;

        let mut collection = Collection {
            href: link.href.clone(),
            ..Default::default()
        };
        let mut create_href = None;
        let mut visited = HashSet::new();
        let mut next = Some(link.href.clone());

        while let Some(href) = next.take() {
            if !visited.insert(href.clone()) {
                debug!(href = %href, "Listing links back to a visited page, stopping");
                break;
            }
            let (url, body) = self.get_document("list", &href).await?;
            let page = hal::parse_collection_page(&url, body)?;
            if create_href.is_none() {
                create_href = page.create_href;
            }
            collection.items.extend(page.items);
            next = page.next;
        }

        collection.create_href = create_href.unwrap_or_else(|| collection.href.clone());
        debug!(
            relation,
            items = collection.items.len(),
            pages = visited.len(),
            "Collection listed"
        );
        Ok(collection)
    }

    #[instrument(
        name = "hypermedia_open_collection",
        skip(self, resource),
        fields(href = %resource.href)
    )]
    async fn open_collection(&self, resource: &Resource, relation: &str) -> Result<Collection> {
        let link = resource
            .link(relation)
            .ok_or_else(|| ContractError::missing_relation(resource.href.as_str(), relation))?;

        let (url, body) = self.get_document("list", &link.href).await?;
        let page = hal::parse_collection_page(&url, body)?;
        Ok(Collection {
            href: link.href.clone(),
            items: page.items,
            create_href: page.create_href.unwrap_or_else(|| link.href.clone()),
        })
    }

    #[instrument(name = "hypermedia_fetch", skip(self, link), fields(href = %link.href))]
    async fn fetch(&self, link: &Link) -> Result<Resource> {
        let (url, body) = self.get_document("fetch", &link.href).await?;
        hal::parse_resource(&url, body)
    }

    #[instrument(
        name = "hypermedia_create",
        skip(self, collection, attributes),
        fields(href = %collection.create_href)
    )]
    async fn create(
        &self,
        collection: &Collection,
        attributes: &Map<String, Value>,
    ) -> Result<Resource> {
        let href = collection.create_href.as_str();
        let url = parse_url("create", href)?;
        let response = self
            .http
            .post(url.clone())
            .header(ACCEPT, HAL_ACCEPT)
            .json(attributes)
            .send()
            .await
            .map_err(|e| request_error("create", href, e))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| hal::resolve_href(&url, value));
        let body = read_body("create", &url, response).await?;

        match (body, location) {
            (Value::Null, Some(location)) => self.fetch(&Link::new(location)).await,
            (Value::Null, None) => Err(ContractError::malformed(
                href,
                "create returned neither a document nor a Location header",
            )),
            (body, location) => {
                let base = location
                    .as_deref()
                    .and_then(|l| Url::parse(l).ok())
                    .unwrap_or(url);
                hal::parse_resource(&base, body)
            }
        }
    }

    #[instrument(name = "hypermedia_persist", skip(self, resource), fields(href = %resource.href))]
    async fn persist(&self, resource: &Resource) -> Result<()> {
        let url = parse_url("persist", &resource.href)?;
        let response = self
            .http
            .put(url.clone())
            .header(ACCEPT, HAL_ACCEPT)
            .json(&resource.properties)
            .send()
            .await
            .map_err(|e| request_error("persist", &resource.href, e))?;
        read_body("persist", &url, response).await?;
        Ok(())
    }
}

fn parse_url(operation: &'static str, href: &str) -> Result<Url> {
    Url::parse(href).map_err(|e| ContractError::resource_api(operation, href, e.to_string()))
}

fn request_error(operation: &'static str, href: &str, error: reqwest::Error) -> ContractError {
    ContractError::resource_api(operation, href, error.to_string())
}

/// Check the status and decode the body; an empty body reads as `Null`
async fn read_body(operation: &'static str, url: &Url, response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(ContractError::resource_api(
            operation,
            url.as_str(),
            format!("unexpected status {status}"),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| request_error(operation, url.as_str(), e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ContractError::malformed(url.as_str(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RelationNames;
    use serde_json::json;
    use server::{CannedServer, Reply};

    fn config() -> ResourceApiConfig {
        ResourceApiConfig {
            url: "http://localhost:8080/".to_string(),
            timeout_secs: 5,
            relations: RelationNames::default(),
        }
    }

    #[test]
    fn test_build_client() {
        assert!(HttpHypermediaClient::new(&config()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_href_is_resource_api_error() {
        let client = HttpHypermediaClient::new(&config()).unwrap();
        let err = client.fetch(&Link::new("not a url")).await.unwrap_err();
        match err {
            ContractError::ResourceApi { operation, href, .. } => {
                assert_eq!(operation, "fetch");
                assert_eq!(href, "not a url");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_follow_missing_relation() {
        let client = HttpHypermediaClient::new(&config()).unwrap();
        let root = Resource::new("http://localhost:8080/");
        let err = client.follow_relation(&root, "ch:devices").await.unwrap_err();
        assert!(matches!(err, ContractError::MissingRelation { .. }));
    }

    /// One-request-per-connection HTTP/1.1 server answering from a fixed route table
    mod server {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        use serde_json::Value;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        #[derive(Debug, Clone)]
        pub struct Reply {
            status: u16,
            location: Option<String>,
            body: String,
        }

        impl Reply {
            pub fn json(status: u16, body: Value) -> Self {
                Self {
                    status,
                    location: None,
                    body: body.to_string(),
                }
            }

            pub fn empty(status: u16) -> Self {
                Self {
                    status,
                    location: None,
                    body: String::new(),
                }
            }

            pub fn with_location(mut self, location: &str) -> Self {
                self.location = Some(location.to_string());
                self
            }
        }

        #[derive(Debug, Clone, PartialEq)]
        pub struct Request {
            pub method: String,
            pub path: String,
            pub body: String,
        }

        impl Request {
            pub fn json(&self) -> Value {
                serde_json::from_str(&self.body).unwrap()
            }
        }

        type Routes = HashMap<(String, String), Reply>;

        pub struct CannedServer {
            base: String,
            requests: Arc<Mutex<Vec<Request>>>,
        }

        impl CannedServer {
            pub async fn start(routes: Vec<(&str, &str, Reply)>) -> Self {
                let routes: Arc<Routes> = Arc::new(
                    routes
                        .into_iter()
                        .map(|(method, path, reply)| ((method.to_string(), path.to_string()), reply))
                        .collect(),
                );
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let base = format!("http://{}", listener.local_addr().unwrap());
                let requests = Arc::new(Mutex::new(Vec::new()));

                let log = Arc::clone(&requests);
                tokio::spawn(async move {
                    while let Ok((stream, _)) = listener.accept().await {
                        let routes = Arc::clone(&routes);
                        let log = Arc::clone(&log);
                        tokio::spawn(async move { answer(stream, &routes, &log).await });
                    }
                });

                Self { base, requests }
            }

            pub fn url(&self, path: &str) -> String {
                format!("{}{path}", self.base)
            }

            pub fn requests(&self) -> Vec<Request> {
                self.requests.lock().unwrap().clone()
            }

            /// `METHOD path` of every request received so far
            pub fn request_lines(&self) -> Vec<String> {
                self.requests()
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.path))
                    .collect()
            }
        }

        async fn answer(mut stream: TcpStream, routes: &Routes, log: &Mutex<Vec<Request>>) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let mut lines = head.lines();
            let mut request_line = lines.next().unwrap_or_default().split_whitespace();
            let method = request_line.next().unwrap_or_default().to_string();
            let path = request_line.next().unwrap_or_default().to_string();
            let content_length = lines
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            while buf.len() < header_end + content_length {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

            let reply = routes
                .get(&(method.clone(), path.clone()))
                .cloned()
                .unwrap_or_else(|| Reply::empty(404));
            log.lock().unwrap().push(Request { method, path, body });

            let mut response = format!("HTTP/1.1 {} Canned\r\nconnection: close\r\n", reply.status);
            if reply.status != 204 {
                response.push_str("content-type: application/hal+json\r\n");
                response.push_str(&format!("content-length: {}\r\n", reply.body.len()));
            }
            if let Some(location) = &reply.location {
                response.push_str(&format!("location: {location}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&reply.body);

            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }

    fn client() -> HttpHypermediaClient {
        HttpHypermediaClient::new(&config()).unwrap()
    }

    #[tokio::test]
    async fn test_follow_relation_walks_pages_until_revisit() {
        let server = CannedServer::start(vec![
            (
                "GET",
                "/",
                Reply::json(200, json!({"_links": {"self": {"href": "/"}, "ch:devices": {"href": "/devices"}}})),
            ),
            (
                "GET",
                "/devices",
                Reply::json(
                    200,
                    json!({"_links": {
                        "self": {"href": "/devices"},
                        "items": [{"href": "/devices/1", "title": "dev1"}],
                        "next": {"href": "/devices?page=2"},
                        "createForm": {"href": "/devices/new"}
                    }}),
                ),
            ),
            (
                "GET",
                "/devices?page=2",
                Reply::json(
                    200,
                    json!({"_links": {
                        "items": [{"href": "/devices/2", "title": "dev2"}],
                        "next": {"href": "/devices"}
                    }}),
                ),
            ),
        ])
        .await;
        let client = client();

        let root = client.get_root(&server.url("/")).await.unwrap();
        let devices = client.follow_relation(&root, "ch:devices").await.unwrap();

        assert_eq!(devices.href, server.url("/devices"));
        assert_eq!(devices.create_href, server.url("/devices/new"));
        let titles: Vec<_> = devices.items.iter().filter_map(|l| l.title.as_deref()).collect();
        assert_eq!(titles, vec!["dev1", "dev2"]);
        assert_eq!(devices.find_by_title("dev2").unwrap().href, server.url("/devices/2"));

        // The second page links back to the first; it is not read twice
        assert_eq!(
            server.request_lines(),
            vec!["GET /", "GET /devices", "GET /devices?page=2"]
        );
    }

    #[tokio::test]
    async fn test_open_collection_reads_first_page_only() {
        let server = CannedServer::start(vec![(
            "GET",
            "/history",
            Reply::json(
                200,
                json!({"_links": {
                    "items": [{"href": "/history/1"}],
                    "next": {"href": "/history?page=2"},
                    "createForm": {"href": "/history/form"}
                }}),
            ),
        )])
        .await;
        let sensor = Resource::new(server.url("/sensors/1"))
            .with_link("ch:dataHistory", Link::new(server.url("/history")));

        let history = client().open_collection(&sensor, "ch:dataHistory").await.unwrap();

        assert_eq!(history.href, server.url("/history"));
        assert_eq!(history.create_href, server.url("/history/form"));
        assert_eq!(history.items.len(), 1);
        assert_eq!(server.request_lines(), vec!["GET /history"]);
    }

    #[tokio::test]
    async fn test_create_posts_to_create_form() {
        let server = CannedServer::start(vec![(
            "POST",
            "/devices/new",
            Reply::json(
                201,
                json!({
                    "_links": {"self": {"href": "/devices/9"}, "ch:sensors": {"href": "/devices/9/sensors"}},
                    "name": "dev9"
                }),
            ),
        )])
        .await;
        let devices = Collection {
            href: server.url("/devices"),
            items: Vec::new(),
            create_href: server.url("/devices/new"),
        };
        let mut attributes = Map::new();
        attributes.insert("name".into(), json!("dev9"));

        let created = client().create(&devices, &attributes).await.unwrap();

        assert_eq!(created.href, server.url("/devices/9"));
        assert_eq!(created.property("name"), Some(&json!("dev9")));
        assert_eq!(
            created.link("ch:sensors").unwrap().href,
            server.url("/devices/9/sensors")
        );

        let requests = server.requests();
        assert_eq!(server.request_lines(), vec!["POST /devices/new"]);
        assert_eq!(requests[0].json(), json!({"name": "dev9"}));
    }

    #[tokio::test]
    async fn test_create_with_empty_body_follows_location() {
        let server = CannedServer::start(vec![
            ("POST", "/sensors", Reply::empty(201).with_location("/sensors/5")),
            (
                "GET",
                "/sensors/5",
                Reply::json(200, json!({"_links": {"self": {"href": "/sensors/5"}}, "metric": "env_temp"})),
            ),
            ("POST", "/bare", Reply::empty(201)),
        ])
        .await;
        let client = client();
        let sensors = Collection {
            href: server.url("/sensors"),
            items: Vec::new(),
            create_href: server.url("/sensors"),
        };
        let mut attributes = Map::new();
        attributes.insert("metric".into(), json!("env_temp"));

        let created = client.create(&sensors, &attributes).await.unwrap();
        assert_eq!(created.href, server.url("/sensors/5"));
        assert_eq!(created.property("metric"), Some(&json!("env_temp")));
        assert_eq!(server.request_lines(), vec!["POST /sensors", "GET /sensors/5"]);

        let bare = Collection {
            href: server.url("/bare"),
            items: Vec::new(),
            create_href: server.url("/bare"),
        };
        let err = client.create(&bare, &attributes).await.unwrap_err();
        assert!(matches!(err, ContractError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn test_persist_puts_properties() {
        let server = CannedServer::start(vec![("PUT", "/devices/9", Reply::empty(204))]).await;
        let mut device = Resource::new(server.url("/devices/9"))
            .with_link("ch:sensors", Link::new(server.url("/devices/9/sensors")));
        device.set_property("name", json!("dev9"));
        device.set_property("geoLocation", json!({"latitude": 1.5, "longitude": 2.5}));

        client().persist(&device).await.unwrap();

        let requests = server.requests();
        assert_eq!(server.request_lines(), vec!["PUT /devices/9"]);
        assert_eq!(
            requests[0].json(),
            json!({"name": "dev9", "geoLocation": {"latitude": 1.5, "longitude": 2.5}})
        );
    }

    #[tokio::test]
    async fn test_error_status_is_resource_api_error() {
        let server = CannedServer::start(vec![(
            "POST",
            "/broken",
            Reply::json(500, json!({"error": "boom"})),
        )])
        .await;
        let client = client();

        match client.fetch(&Link::new(server.url("/missing"))).await.unwrap_err() {
            ContractError::ResourceApi {
                operation,
                href,
                message,
            } => {
                assert_eq!(operation, "fetch");
                assert_eq!(href, server.url("/missing"));
                assert!(message.contains("404"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let broken = Collection {
            href: server.url("/broken"),
            items: Vec::new(),
            create_href: server.url("/broken"),
        };
        let err = client.create(&broken, &Map::new()).await.unwrap_err();
        assert!(matches!(err, ContractError::ResourceApi { operation: "create", .. }));
    }
}
