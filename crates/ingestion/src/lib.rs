//! # Ingestion
//!
//! Telemetry ingestion from transport to resource API.
//!
//! Responsibilities:
//! - Subscribe to device topics and decode payloads ([`MessageIngestor`])
//! - Resolve devices and sensors with process-lifetime caches ([`ResourceResolver`])
//! - Run the per-event task body: geolocation update and sample append
//!   ([`IngestionCoordinator`])
//!
//! ## Usage Example
//!
//! ```ignore
//! let coordinator = IngestionCoordinator::new(client, FieldClassifier::standard()?, &config.resource_api);
//! let queue = OrderedTaskQueue::spawn("events", coordinator);
//!
//! MessageIngestor::new(config.transport).run(&queue, shutdown).await?;
//! queue.shutdown().await;
//! ```

mod coordinator;
mod decode;
mod error;
mod ingestor;
mod resolver;

pub use coordinator::{EventOutcome, IngestionCoordinator};
pub use decode::decode_event;
pub use error::{IngestionError, Result};
pub use ingestor::{handle_publish, MessageIngestor};
pub use resolver::{Device, DeviceCache, ResolverStats, ResourceResolver, Sensor, SensorCache};
