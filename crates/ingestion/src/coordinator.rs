//! IngestionCoordinator - the per-event task body
//!
//! For each event: resolve the device, update its geolocation if it moved,
//! then append one sample per numeric, non-ignored field.

use std::time::Instant;

use classifier::FieldClassifier;
use contracts::{RelationNames, ResourceApiConfig, Sample, TelemetryEvent};
use hypermedia::HypermediaClient;
use task_queue::TaskHandler;
use tracing::{debug, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::resolver::{ResolverStats, ResourceResolver};

/// What happened to one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub geolocation_updated: bool,
    pub samples_appended: usize,
    /// Numeric metrics whose sensor or sample could not be written
    pub metrics_dropped: usize,
}

/// Task body run by the ordered queue
pub struct IngestionCoordinator<C> {
    client: C,
    classifier: FieldClassifier,
    resolver: ResourceResolver,
    relations: RelationNames,
}

impl<C: HypermediaClient> IngestionCoordinator<C> {
    pub fn new(client: C, classifier: FieldClassifier, config: &ResourceApiConfig) -> Self {
        Self {
            client,
            classifier,
            resolver: ResourceResolver::new(config.url.as_str(), &config.relations),
            relations: config.relations.clone(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.resolver.stats()
    }

    /// Process one event
    ///
    /// # Errors
    /// Only when the device cannot be resolved. Per-metric and geolocation
    /// failures are logged and reflected in the outcome.
    #[instrument(
        name = "ingest_event",
        skip(self, event),
        fields(device_urn = %event.device_urn, when_captured = %event.when_captured)
    )]
    pub async fn process(&mut self, event: TelemetryEvent) -> Result<EventOutcome> {
        let started = Instant::now();
        let Self {
            client,
            classifier,
            resolver,
            relations,
        } = self;
        let (client, classifier, relations) = (&*client, &*classifier, &*relations);

        let device = resolver
            .resolve_device(client, &event.device_urn)
            .await
            .ok_or_else(|| IngestionError::DeviceUnavailable {
                urn: event.device_urn.clone(),
            })?;

        let mut outcome = EventOutcome::default();

        if let Some(location) = event.geolocation() {
            match device.update_geolocation(client, location).await {
                Ok(true) => {
                    debug!(?location, "Geolocation updated");
                    observability::record_geolocation_update();
                    outcome.geolocation_updated = true;
                }
                Ok(false) => debug!("Geolocation unchanged"),
                Err(e) => warn!(error = %e, "Failed to persist geolocation"),
            }
        }

        for (metric, value) in event.fields() {
            if classifier.should_ignore(metric) {
                continue;
            }
            let Some(value) = value.as_f64() else {
                continue;
            };

            let Some(sensor) = device
                .resolve_sensor(client, classifier, &relations.sensors, metric)
                .await
            else {
                outcome.metrics_dropped += 1;
                continue;
            };

            let sample = Sample {
                timestamp: event.when_captured.clone(),
                value,
            };
            match sensor.append_sample(client, &relations.data_history, &sample).await {
                Ok(()) => {
                    observability::record_sample_appended();
                    outcome.samples_appended += 1;
                }
                Err(e) => {
                    warn!(metric, error = %e, "Failed to append sample");
                    outcome.metrics_dropped += 1;
                }
            }
        }

        observability::record_event_duration_ms(started.elapsed().as_secs_f64() * 1000.0);
        debug!(
            samples = outcome.samples_appended,
            dropped = outcome.metrics_dropped,
            "Event processed"
        );
        Ok(outcome)
    }
}

impl<C: HypermediaClient> TaskHandler<TelemetryEvent> for IngestionCoordinator<C> {
    type Error = IngestionError;

    async fn handle(&mut self, event: TelemetryEvent) -> Result<()> {
        self.process(event).await.map(|_| ())
    }
}
