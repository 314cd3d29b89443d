//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Device could not be found or created, the event was dropped
    #[error("device '{urn}' could not be resolved, event dropped")]
    DeviceUnavailable { urn: String },

    /// Wrapped ContractError (decode, transport, resource API)
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
