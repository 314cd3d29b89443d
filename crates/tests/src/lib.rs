//! # Integration Tests
//!
//! End-to-end tests through the real queue and coordinator against the
//! in-memory resource API.

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use classifier::FieldClassifier;
    use contracts::{RelationNames, Resource, ResourceApiConfig, TelemetryEvent};
    use hypermedia::{InMemoryHypermediaClient, MEMORY_ROOT_URL};
    use ingestion::{IngestionCoordinator, IngestionError};
    use serde_json::{Map, Value};
    use task_queue::OrderedTaskQueue;

    pub fn api_config(relations: RelationNames) -> ResourceApiConfig {
        ResourceApiConfig {
            url: MEMORY_ROOT_URL.to_string(),
            timeout_secs: 30,
            relations,
        }
    }

    /// Queue wired like the binary, recording every failure
    pub fn spawn_pipeline(
        client: &InMemoryHypermediaClient,
    ) -> (OrderedTaskQueue<TelemetryEvent>, Arc<Mutex<Vec<String>>>) {
        let coordinator = IngestionCoordinator::new(
            client.clone(),
            FieldClassifier::standard().unwrap(),
            &api_config(client.relations().clone()),
        );
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let queue = OrderedTaskQueue::builder("events", coordinator)
            .on_error(move |e: &IngestionError| sink.lock().unwrap().push(e.to_string()))
            .spawn();
        (queue, failures)
    }

    pub fn device(client: &InMemoryHypermediaClient, urn: &str) -> Resource {
        client
            .find_member(&client.devices_href(), urn)
            .unwrap_or_else(|| panic!("device {urn} not created"))
    }

    pub fn sensors(client: &InMemoryHypermediaClient, device: &Resource) -> Vec<Map<String, Value>> {
        client.member_properties(device, &client.relations().sensors)
    }

    pub fn sensor(client: &InMemoryHypermediaClient, device: &Resource, metric: &str) -> Resource {
        let link = device.link(&client.relations().sensors).unwrap();
        client
            .find_member(&link.href, metric)
            .unwrap_or_else(|| panic!("sensor {metric} not created"))
    }

    pub fn history(client: &InMemoryHypermediaClient, sensor: &Resource) -> Vec<Map<String, Value>> {
        client.member_properties(sensor, &client.relations().data_history)
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{GeoLocation, RelationNames, TelemetryEvent};
    use hypermedia::{InMemoryHypermediaClient, MemoryConfig};
    use ingestion::handle_publish;
    use serde_json::json;

    use crate::support::*;

    fn scenario_one_event() -> TelemetryEvent {
        TelemetryEvent::new("dev1", "T0")
            .with_field("loc_lat", 10)
            .with_field("loc_lon", 20)
            .with_field("env_temp", 22.5)
    }

    /// Unseen device: device, geolocation, three sensors with one sample each
    #[tokio::test]
    async fn test_first_event_creates_device_and_sensors() {
        let client = InMemoryHypermediaClient::new();
        let (queue, failures) = spawn_pipeline(&client);

        queue.push(scenario_one_event());
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        let device = device(&client, "dev1");
        assert_eq!(
            device.property("geoLocation").and_then(GeoLocation::from_value),
            Some(GeoLocation {
                latitude: 10.0,
                longitude: 20.0
            })
        );

        let units: Vec<_> = sensors(&client, &device)
            .into_iter()
            .map(|s| (s["metric"].clone(), s["unit"].clone(), s["sensor-type"].clone()))
            .collect();
        assert_eq!(
            units,
            vec![
                (json!("loc_lat"), json!("degrees"), json!("scalar")),
                (json!("loc_lon"), json!("degrees"), json!("scalar")),
                (json!("env_temp"), json!("°C"), json!("scalar")),
            ]
        );

        for (metric, value) in [("loc_lat", 10.0), ("loc_lon", 20.0), ("env_temp", 22.5)] {
            let samples = history(&client, &sensor(&client, &device, metric));
            assert_eq!(samples.len(), 1, "{metric}");
            assert_eq!(samples[0]["timestamp"], json!("T0"));
            assert_eq!(samples[0]["value"], json!(value));
        }
    }

    /// Same location again: no persist, cached sensor, one more sample
    #[tokio::test]
    async fn test_second_event_uses_cache_and_skips_geolocation() {
        let client = InMemoryHypermediaClient::new();
        let (queue, failures) = spawn_pipeline(&client);

        queue.push(scenario_one_event());
        queue.push(
            TelemetryEvent::new("dev1", "T1")
                .with_field("loc_lat", 10)
                .with_field("loc_lon", 20)
                .with_field("env_temp", 23.1),
        );
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        let calls = client.calls();
        assert_eq!(calls.persist, 1);
        // 1 device + 3 sensors + 6 samples
        assert_eq!(calls.create, 10);
        // Device scan and sensor scans happen only on the first event
        assert_eq!(calls.get_root, 1);
        assert_eq!(calls.follow_relation, 4);
        // Each history is opened once for its create target, then posted to directly
        assert_eq!(calls.open_collection, 3);

        let device = device(&client, "dev1");
        let samples = history(&client, &sensor(&client, &device, "env_temp"));
        let values: Vec<_> = samples.iter().map(|s| s["value"].clone()).collect();
        assert_eq!(values, vec![json!(22.5), json!(23.1)]);
        assert_eq!(samples[1]["timestamp"], json!("T1"));
    }

    /// Nothing but ignored and non-numeric fields
    #[tokio::test]
    async fn test_event_without_metrics_creates_only_device() {
        let client = InMemoryHypermediaClient::new();
        let (queue, failures) = spawn_pipeline(&client);

        queue.push(
            TelemetryEvent::new("dev1", "T0")
                .with_field("dev_label", 1)
                .with_field("gateway_rssi", -70)
                .with_field("service_handler", "x")
                .with_field("loc_alt", 12.0)
                .with_field("loc_when_motion_began", 5)
                .with_field("loc_olc", "8Q7XJP00+")
                .with_field("note", "hello"),
        );
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        let device = device(&client, "dev1");
        assert!(sensors(&client, &device).is_empty());
        assert_eq!(client.calls().create, 1);
    }

    /// Device creation failure drops the event, the next one still runs
    #[tokio::test]
    async fn test_device_creation_failure_does_not_halt_queue() {
        let client = InMemoryHypermediaClient::with_config(MemoryConfig {
            fail_create_titles: vec!["broken".to_string()],
            ..Default::default()
        });
        let (queue, failures) = spawn_pipeline(&client);

        queue.push(TelemetryEvent::new("broken", "T0").with_field("env_temp", 1.0));
        queue.push(TelemetryEvent::new("dev2", "T1").with_field("env_temp", 2.0));
        let metrics = Arc::clone(queue.metrics());
        queue.shutdown().await;

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("broken"));

        assert!(client.find_member(&client.devices_href(), "broken").is_none());
        let device = device(&client, "dev2");
        assert_eq!(history(&client, &sensor(&client, &device, "env_temp")).len(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
    }

    /// Two events for the same unseen device pushed from concurrent producers
    #[tokio::test]
    async fn test_concurrent_events_create_one_device() {
        let client = InMemoryHypermediaClient::with_config(MemoryConfig {
            latency: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let (queue, failures) = spawn_pipeline(&client);
        let queue = Arc::new(queue);

        let producers: Vec<_> = (0..2)
            .map(|i| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    queue.push(
                        TelemetryEvent::new("fresh", format!("T{i}")).with_field("env_temp", i),
                    );
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let queue = Arc::try_unwrap(queue).ok().unwrap();
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        assert_eq!(client.members(&client.devices_href()).len(), 1);
        let device = device(&client, "fresh");
        assert_eq!(sensors(&client, &device).len(), 1);
        assert_eq!(history(&client, &sensor(&client, &device, "env_temp")).len(), 2);
    }

    /// Geolocation persisted on first sight and on every move, never on repeats
    #[tokio::test]
    async fn test_geolocation_persisted_only_on_change() {
        let client = InMemoryHypermediaClient::new();
        let (queue, _) = spawn_pipeline(&client);

        for (lat, lon) in [(1.0, 2.0), (1.0, 2.0), (1.0, 3.0), (1.0, 3.0)] {
            queue.push(
                TelemetryEvent::new("mover", "T")
                    .with_field("loc_lat", lat)
                    .with_field("loc_lon", lon),
            );
        }
        queue.shutdown().await;

        assert_eq!(client.calls().persist, 2);
        let device = device(&client, "mover");
        assert_eq!(
            device.property("geoLocation"),
            Some(&json!({"latitude": 1.0, "longitude": 3.0}))
        );
    }

    /// Device already present remotely is reused, not duplicated
    #[tokio::test]
    async fn test_existing_remote_device_is_reused() {
        let client = InMemoryHypermediaClient::new();
        let mut attributes = serde_json::Map::new();
        attributes.insert("name".into(), json!("known"));
        let existing = client.seed(&client.devices_href(), attributes).unwrap();

        let (queue, _) = spawn_pipeline(&client);
        queue.push(TelemetryEvent::new("known", "T0").with_field("bat_voltage", 3.7));
        queue.shutdown().await;

        assert_eq!(client.members(&client.devices_href()).len(), 1);
        let sensor = sensor(&client, &existing, "bat_voltage");
        assert_eq!(sensor.property("unit"), Some(&json!("volts")));
    }

    /// Raw payloads through the transport handler, garbage included
    #[tokio::test]
    async fn test_raw_payloads_decode_and_process_in_order() {
        let client = InMemoryHypermediaClient::new();
        let (queue, failures) = spawn_pipeline(&client);

        let payloads: [&[u8]; 4] = [
            br#"{"device_urn":"dev1","when_captured":"T0","lnd_7318u":31}"#,
            b"\xff\xfe not json",
            br#"{"when_captured":"T1"}"#,
            br#"{"device_urn":"dev1","when_captured":"T2","lnd_7318u":35}"#,
        ];
        let enqueued: Vec<_> = payloads
            .iter()
            .map(|payload| handle_publish(&queue, "device/dev1", payload))
            .collect();
        queue.shutdown().await;

        assert_eq!(enqueued, vec![true, false, false, true]);
        assert!(failures.lock().unwrap().is_empty());

        let device = device(&client, "dev1");
        let sensor = sensor(&client, &device, "lnd_7318u");
        assert_eq!(sensor.property("unit"), Some(&json!("counts/minute")));
        let timestamps: Vec<_> = history(&client, &sensor)
            .iter()
            .map(|s| s["timestamp"].clone())
            .collect();
        assert_eq!(timestamps, vec![json!("T0"), json!("T2")]);
    }

    /// Epoch-number capture times are carried to samples unchanged
    #[tokio::test]
    async fn test_numeric_capture_time_passes_through() {
        let client = InMemoryHypermediaClient::new();
        let (queue, failures) = spawn_pipeline(&client);

        let payload = br#"{"device_urn":"dev1","when_captured":1483228800,"env_temp":21.0}"#;
        assert!(handle_publish(&queue, "device/dev1", payload));
        assert!(!handle_publish(
            &queue,
            "device/dev1",
            br#"{"device_urn":"dev1","when_captured":null,"env_temp":22.0}"#
        ));
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        let device = device(&client, "dev1");
        let samples = history(&client, &sensor(&client, &device, "env_temp"));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["timestamp"], json!(1483228800));
        assert_eq!(samples[0]["value"], json!(21.0));
    }

    /// Custom relation names flow from configuration to every traversal
    #[tokio::test]
    async fn test_custom_relation_names() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
[resource_api]
url = "http://chain.example.org/"

[resource_api.relations]
devices = "x:devices"
sensors = "x:sensors"
data_history = "x:history"

[transport]
broker_url = "localhost"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_ne!(config.resource_api.relations, RelationNames::default());

        let client = InMemoryHypermediaClient::with_relations(
            config.resource_api.relations.clone(),
            MemoryConfig::default(),
        );
        let (queue, failures) = spawn_pipeline(&client);
        queue.push(TelemetryEvent::new("dev1", "T0").with_field("pms_c0_3", 120));
        queue.shutdown().await;

        assert!(failures.lock().unwrap().is_empty());
        let device = device(&client, "dev1");
        assert!(device.link("x:sensors").is_some());
        let sensor = sensor(&client, &device, "pms_c0_3");
        assert_eq!(sensor.property("unit"), Some(&json!("counts")));
        assert_eq!(history(&client, &sensor).len(), 1);
    }
}
