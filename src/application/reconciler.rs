// External source reconciler - Polls a third-party GPS provider and feeds the ingestion path
use crate::application::ingestion_service::IngestionService;
use crate::application::normalizer::normalize_location;
use crate::application::repository::FleetDirectory;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::telemetry::TelemetryEvent;
use crate::domain::vehicle::{NewVehicle, Vehicle, VehicleUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// One device record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDevice {
    /// Stable provider id, stored as the vehicle's plate
    pub external_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub online: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub altitude: Option<f64>,
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait GpsProvider: Send + Sync {
    async fn fetch_devices(&self) -> Result<Vec<ExternalDevice>, UpstreamError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub devices: usize,
    pub vehicles_created: usize,
    pub vehicles_toggled: usize,
    pub samples_ingested: usize,
    pub samples_rejected: usize,
    pub failures: usize,
}

pub struct Reconciler {
    provider: Arc<dyn GpsProvider>,
    fleet: Arc<dyn FleetDirectory>,
    ingestion: IngestionService,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        provider: Arc<dyn GpsProvider>,
        fleet: Arc<dyn FleetDirectory>,
        ingestion: IngestionService,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            fleet,
            ingestion,
            interval,
        }
    }

    /// Tick until `shutdown` flips to true. Failed cycles are logged and the
    /// loop carries on.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "reconciler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.reconcile_once().await;
                    tracing::info!(?report, "reconcile cycle finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("reconciler stopped");
    }

    pub async fn reconcile_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let devices = match self.provider.fetch_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(error = %e, "gps provider fetch failed, skipping cycle");
                return report;
            }
        };
        report.devices = devices.len();

        for device in devices {
            if device.external_id.trim().is_empty() {
                tracing::warn!(name = %device.name, "device without external id skipped");
                report.failures += 1;
                continue;
            }
            if let Err(e) = self.reconcile_device(&device, &mut report).await {
                tracing::warn!(external_id = %device.external_id, error = %e, "device reconcile failed");
                report.failures += 1;
            }
        }

        report
    }

    async fn reconcile_device(
        &self,
        device: &ExternalDevice,
        report: &mut ReconcileReport,
    ) -> CoreResult<()> {
        let vehicle = self.resolve_vehicle(device, report).await?;

        let (Some(latitude), Some(longitude)) = (device.latitude, device.longitude) else {
            return Ok(());
        };

        // Provider readings go through the same normalizer as device pushes
        let raw = location_payload(&vehicle.id, latitude, longitude, device);
        let sample = match normalize_location(&raw) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(external_id = %device.external_id, error = %e, "provider sample rejected");
                report.samples_rejected += 1;
                return Ok(());
            }
        };

        let ingested = self
            .ingestion
            .ingest_event(TelemetryEvent::Location(sample))
            .await?;
        tracing::debug!(
            external_id = %device.external_id,
            record_id = %ingested.record_id(),
            "provider sample ingested"
        );
        report.samples_ingested += 1;
        Ok(())
    }

    async fn resolve_vehicle(
        &self,
        device: &ExternalDevice,
        report: &mut ReconcileReport,
    ) -> CoreResult<Vehicle> {
        match self.fleet.find_vehicle_by_plate(&device.external_id).await? {
            Some(vehicle) if vehicle.active == device.online => Ok(vehicle),
            Some(vehicle) => {
                let updated = self
                    .fleet
                    .update_vehicle(&vehicle.id, VehicleUpdate::active(device.online))
                    .await?
                    .ok_or_else(|| CoreError::not_found("vehicle", vehicle.id.clone()))?;
                tracing::info!(vehicle_id = %updated.id, active = updated.active, "vehicle active flag toggled");
                report.vehicles_toggled += 1;
                Ok(updated)
            }
            None => {
                let name = if device.name.trim().is_empty() {
                    device.external_id.clone()
                } else {
                    device.name.clone()
                };
                let created = self
                    .fleet
                    .create_vehicle(NewVehicle {
                        name,
                        plate: device.external_id.clone(),
                        active: device.online,
                        ..Default::default()
                    })
                    .await?;
                tracing::info!(vehicle_id = %created.id, plate = %created.plate, "vehicle created from provider");
                report.vehicles_created += 1;
                Ok(created)
            }
        }
    }
}

/// Canonical location payload; optional readings are omitted so the
/// normalizer applies its defaults.
fn location_payload(vehicle_id: &str, latitude: f64, longitude: f64, device: &ExternalDevice) -> Value {
    let mut raw = Map::new();
    raw.insert("vehicleId".into(), json!(vehicle_id));
    raw.insert("latitude".into(), json!(latitude));
    raw.insert("longitude".into(), json!(longitude));
    if let Some(speed) = device.speed {
        raw.insert("speed".into(), json!(speed));
    }
    if let Some(heading) = device.heading {
        raw.insert("heading".into(), json!(heading));
    }
    if let Some(altitude) = device.altitude {
        raw.insert("altitude".into(), json!(altitude));
    }
    if let Some(at) = device.reported_at {
        raw.insert("eventTime".into(), json!(at.to_rfc3339()));
    }
    Value::Object(raw)
}
