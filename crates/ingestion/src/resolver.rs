//! ResourceResolver - maps device URNs and metric names onto remote resources
//!
//! Lookups go cache first, then a title scan of the remote collection, then
//! a create. Entries are never evicted. The scan-then-create sequence is
//! not atomic on its own; callers must not run two resolutions at once
//! (the ordered queue guarantees this).

use std::collections::HashMap;

use classifier::FieldClassifier;
use contracts::{
    Collection, ContractError, GeoLocation, RelationNames, Resource, Sample, GEOLOCATION_PROPERTY,
};
use hypermedia::HypermediaClient;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

/// URN -> device, process lifetime
pub type DeviceCache = HashMap<String, Device>;

/// Metric name -> sensor, one per device
pub type SensorCache = HashMap<String, Sensor>;

/// Cache sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub devices: usize,
    pub sensors: usize,
}

/// A resolved device with its own sensor cache
#[derive(Debug, Clone)]
pub struct Device {
    urn: String,
    resource: Resource,
    sensors: SensorCache,
}

impl Device {
    pub fn new(urn: impl Into<String>, resource: Resource) -> Self {
        Self {
            urn: urn.into(),
            resource,
            sensors: SensorCache::new(),
        }
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Last fetched or persisted state of the remote device
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn cached_sensor(&self, metric: &str) -> Option<&Sensor> {
        self.sensors.get(metric)
    }

    /// Last known geolocation property
    pub fn geolocation(&self) -> Option<GeoLocation> {
        self.resource
            .property(GEOLOCATION_PROPERTY)
            .and_then(GeoLocation::from_value)
    }

    /// Persist `location` unless it equals the last known value
    ///
    /// The local copy only changes once the persist succeeded.
    ///
    /// # Returns
    /// Whether a persist happened
    pub async fn update_geolocation<C: HypermediaClient>(
        &mut self,
        client: &C,
        location: GeoLocation,
    ) -> Result<bool, ContractError> {
        if self.geolocation() == Some(location) {
            return Ok(false);
        }

        let mut updated = self.resource.clone();
        updated.set_property(GEOLOCATION_PROPERTY, location.to_value());
        client.persist(&updated).await?;
        self.resource = updated;
        Ok(true)
    }

    /// Resolve the sensor for `metric` under this device
    ///
    /// Returns `None` if the sensor could neither be found nor created; the
    /// failure is logged and nothing is cached.
    #[instrument(
        name = "resolve_sensor",
        skip(self, client, classifier, relation),
        fields(device_urn = %self.urn)
    )]
    pub async fn resolve_sensor<C: HypermediaClient>(
        &mut self,
        client: &C,
        classifier: &FieldClassifier,
        relation: &str,
        metric: &str,
    ) -> Option<&mut Sensor> {
        let hit = self.sensors.contains_key(metric);
        observability::record_cache_lookup("sensor", hit);

        if !hit {
            match self.find_or_create_sensor(client, classifier, relation, metric).await {
                Ok(resource) => {
                    self.sensors.insert(metric.to_string(), Sensor::new(resource));
                }
                Err(e) => {
                    warn!(device_urn = %self.urn, metric, error = %e, "Failed to resolve sensor");
                    observability::record_resolution_failure("sensor");
                    return None;
                }
            }
        }
        self.sensors.get_mut(metric)
    }

    async fn find_or_create_sensor<C: HypermediaClient>(
        &self,
        client: &C,
        classifier: &FieldClassifier,
        relation: &str,
        metric: &str,
    ) -> Result<Resource, ContractError> {
        let sensors = client.follow_relation(&self.resource, relation).await?;
        if let Some(link) = sensors.find_by_title(metric) {
            debug!(metric, href = %link.href, "Found existing sensor");
            return client.fetch(link).await;
        }

        let unit = classifier.lookup_unit(metric);
        let mut attributes = Map::new();
        attributes.insert("sensor-type".into(), Value::from("scalar"));
        attributes.insert("metric".into(), Value::from(metric));
        attributes.insert("unit".into(), Value::from(unit));

        let sensor = client.create(&sensors, &attributes).await?;
        info!(device_urn = %self.urn, metric, unit, href = %sensor.href, "Created sensor");
        observability::record_resource_created("sensor");
        Ok(sensor)
    }
}

/// A resolved sensor and the create target of its data history
#[derive(Debug, Clone)]
pub struct Sensor {
    resource: Resource,
    history: Option<Collection>,
}

impl Sensor {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            history: None,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Append one sample to the data history behind `relation`
    ///
    /// The first append opens the history collection to learn its create
    /// target; later appends post there directly without listing.
    pub async fn append_sample<C: HypermediaClient>(
        &mut self,
        client: &C,
        relation: &str,
        sample: &Sample,
    ) -> Result<(), ContractError> {
        let history = match self.history.take() {
            Some(history) => history,
            None => {
                let mut history = client.open_collection(&self.resource, relation).await?;
                // Only the create target is needed from here on
                history.items.clear();
                history
            }
        };

        let created = client.create(&history, &sample.to_attributes()).await;
        self.history = Some(history);
        created.map(|_| ())
    }
}

/// Device cache in front of the remote devices collection
#[derive(Debug)]
pub struct ResourceResolver {
    root_url: String,
    devices_relation: String,
    devices: DeviceCache,
}

impl ResourceResolver {
    pub fn new(root_url: impl Into<String>, relations: &RelationNames) -> Self {
        Self {
            root_url: root_url.into(),
            devices_relation: relations.devices.clone(),
            devices: DeviceCache::new(),
        }
    }

    /// Resolve the device for `urn`
    ///
    /// Returns `None` if the device could neither be found nor created; the
    /// failure is logged and nothing is cached, so a later event retries.
    #[instrument(name = "resolve_device", skip(self, client))]
    pub async fn resolve_device<C: HypermediaClient>(
        &mut self,
        client: &C,
        urn: &str,
    ) -> Option<&mut Device> {
        let hit = self.devices.contains_key(urn);
        observability::record_cache_lookup("device", hit);

        if !hit {
            match self.find_or_create_device(client, urn).await {
                Ok(resource) => {
                    self.devices
                        .insert(urn.to_string(), Device::new(urn, resource));
                }
                Err(e) => {
                    warn!(device_urn = %urn, error = %e, "Failed to resolve device");
                    observability::record_resolution_failure("device");
                    return None;
                }
            }
        }
        self.devices.get_mut(urn)
    }

    pub fn device(&self, urn: &str) -> Option<&Device> {
        self.devices.get(urn)
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            devices: self.devices.len(),
            sensors: self.devices.values().map(Device::sensor_count).sum(),
        }
    }

    async fn find_or_create_device<C: HypermediaClient>(
        &self,
        client: &C,
        urn: &str,
    ) -> Result<Resource, ContractError> {
        let root = client.get_root(&self.root_url).await?;
        let devices = client.follow_relation(&root, &self.devices_relation).await?;
        if let Some(link) = devices.find_by_title(urn) {
            debug!(device_urn = %urn, href = %link.href, "Found existing device");
            return client.fetch(link).await;
        }

        let mut attributes = Map::new();
        attributes.insert("name".into(), Value::from(urn));
        let device = client.create(&devices, &attributes).await?;
        info!(device_urn = %urn, href = %device.href, "Created device");
        observability::record_resource_created("device");
        Ok(device)
    }
}
