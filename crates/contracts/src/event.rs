//! TelemetryEvent - decoded transport message
//!
//! The two reserved fields are typed; everything else is kept verbatim,
//! in payload order, so the classifier can decide what becomes a sensor.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field carrying the device latitude
pub const LATITUDE_FIELD: &str = "loc_lat";

/// Field carrying the device longitude
pub const LONGITUDE_FIELD: &str = "loc_lon";

/// Device property holding the last known geolocation
pub const GEOLOCATION_PROPERTY: &str = "geoLocation";

/// One telemetry message as published by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Device identifier (URN)
    pub device_urn: String,

    /// Capture timestamp, passed through untouched to every sample
    ///
    /// Devices publish either ISO strings or epoch numbers; any non-null
    /// JSON value is accepted.
    #[serde(deserialize_with = "non_null")]
    pub when_captured: Value,

    /// Every other top-level field of the payload
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    /// Create an event with no fields
    pub fn new(device_urn: impl Into<String>, when_captured: impl Into<Value>) -> Self {
        Self {
            device_urn: device_urn.into(),
            when_captured: when_captured.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Geolocation carried by the event
    ///
    /// Present only when both `loc_lat` and `loc_lon` are numbers.
    pub fn geolocation(&self) -> Option<GeoLocation> {
        let latitude = self.fields.get(LATITUDE_FIELD)?.as_f64()?;
        let longitude = self.fields.get(LONGITUDE_FIELD)?.as_f64()?;
        Some(GeoLocation {
            latitude,
            longitude,
        })
    }

    /// Iterate all fields in payload order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn non_null<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Err(de::Error::custom("when_captured must not be null")),
        value => Ok(value),
    }
}

/// Latitude/longitude pair stored on a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Read a geolocation back from a stored property value
    ///
    /// Returns `None` for anything that is not an object with two numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            latitude: object.get("latitude")?.as_f64()?,
            longitude: object.get("longitude")?.as_f64()?,
        })
    }

    /// Property value representation
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }
}

/// One point appended to a sensor's data history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Value,
    pub value: f64,
}

impl Sample {
    /// Create-attributes for the data history collection
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("timestamp".into(), self.timestamp.clone());
        attributes.insert("value".into(), Value::from(self.value));
        attributes
    }
}
