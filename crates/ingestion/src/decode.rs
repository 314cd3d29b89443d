//! Payload decoding

use contracts::{ContractError, TelemetryEvent};

use crate::error::Result;

/// Decode one transport payload
///
/// The payload must be a JSON object carrying a string `device_urn` and a
/// non-null `when_captured`. Any other fields are kept as-is.
pub fn decode_event(payload: &[u8]) -> Result<TelemetryEvent> {
    serde_json::from_slice(payload).map_err(|e| ContractError::decode(e.to_string()).into())
}
