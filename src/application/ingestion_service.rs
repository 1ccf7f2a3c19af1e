// Ingestion service - normalize -> extend trip -> store -> fanout, per vehicle serialized
use crate::application::broadcaster::Broadcaster;
use crate::application::credentials::CredentialVerifier;
use crate::application::normalizer::{normalize_diagnostic, normalize_location};
use crate::application::repository::VehicleStateStore;
use crate::application::trip_sessions::{CompleteTrip, StartTrip, TripSessionManager};
use crate::application::vehicle_locks::VehicleLocks;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::telemetry::{
    DiagnosticSample, LocationSample, StoredDiagnostic, StoredLocation, TelemetryEvent,
};
use crate::domain::trip::TripSession;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// The stored record produced by one ingested event.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Location(StoredLocation),
    Diagnostic(StoredDiagnostic),
}

impl Ingested {
    pub fn record_id(&self) -> Uuid {
        match self {
            Ingested::Location(s) => s.id,
            Ingested::Diagnostic(s) => s.id,
        }
    }
}

fn mismatched(expected: &str, got: &Ingested) -> CoreError {
    CoreError::Storage(format!("record {} is not a {}", got.record_id(), expected))
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn VehicleStateStore>,
    trips: TripSessionManager,
    broadcaster: Arc<Broadcaster>,
    credentials: Arc<dyn CredentialVerifier>,
    locks: Arc<VehicleLocks>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn VehicleStateStore>,
        trips: TripSessionManager,
        broadcaster: Arc<Broadcaster>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            store,
            trips,
            broadcaster,
            credentials,
            locks: Arc::new(VehicleLocks::new()),
        }
    }

    pub async fn ingest_location(
        &self,
        raw: &Value,
        credential: Option<&str>,
    ) -> CoreResult<StoredLocation> {
        self.authorize(credential)?;
        let sample = normalize_location(raw).inspect_err(|e| {
            tracing::warn!(error = %e, "location rejected");
        })?;
        match self.ingest_event(TelemetryEvent::Location(sample)).await? {
            Ingested::Location(stored) => Ok(stored),
            other => Err(mismatched("location", &other)),
        }
    }

    pub async fn ingest_diagnostic(
        &self,
        raw: &Value,
        credential: Option<&str>,
    ) -> CoreResult<StoredDiagnostic> {
        self.authorize(credential)?;
        let sample = normalize_diagnostic(raw).inspect_err(|e| {
            tracing::warn!(error = %e, "diagnostic rejected");
        })?;
        match self.ingest_event(TelemetryEvent::Diagnostic(sample)).await? {
            Ingested::Diagnostic(stored) => Ok(stored),
            other => Err(mismatched("diagnostic", &other)),
        }
    }

    /// Apply an already normalized event. No credential check: device pushes
    /// are authorized above, and internal sources such as the reconciler are
    /// trusted.
    pub async fn ingest_event(&self, event: TelemetryEvent) -> CoreResult<Ingested> {
        tracing::trace!(vehicle_id = %event.vehicle_id(), "telemetry event accepted");
        let svc = self.clone();
        detached(async move {
            match event {
                TelemetryEvent::Location(s) => svc.apply_location(s).await.map(Ingested::Location),
                TelemetryEvent::Diagnostic(s) => {
                    svc.apply_diagnostic(s).await.map(Ingested::Diagnostic)
                }
            }
        })
        .await
    }

    pub async fn start_trip(&self, request: StartTrip) -> CoreResult<TripSession> {
        let _guard = self.locks.acquire(&request.vehicle_id).await;
        self.trips.start_trip(request).await
    }

    pub async fn complete_trip(
        &self,
        trip_id: Uuid,
        request: CompleteTrip,
    ) -> CoreResult<TripSession> {
        let vehicle_id = self
            .trips
            .get_trip(trip_id)
            .await?
            .map(|t| t.vehicle_id)
            .ok_or_else(|| CoreError::not_found("active trip", trip_id.to_string()))?;

        let _guard = self.locks.acquire(&vehicle_id).await;
        self.trips.complete_trip(trip_id, request).await
    }

    async fn apply_location(&self, sample: LocationSample) -> CoreResult<StoredLocation> {
        let _guard = self.locks.acquire(&sample.vehicle_id).await;

        // Extend first, then store sample and session in one write
        let extended = match self.trips.correlate(&sample).await? {
            Some(trip) => Some(self.trips.advance(&trip, &sample)?),
            None => None,
        };
        let stored = self.store.record_location(sample, extended).await?;

        let report = self.broadcaster.publish((&stored).into());
        tracing::debug!(
            vehicle_id = %stored.sample.vehicle_id,
            trip_id = ?stored.trip_id,
            observers = report.delivered,
            "location ingested"
        );
        Ok(stored)
    }

    async fn apply_diagnostic(&self, sample: DiagnosticSample) -> CoreResult<StoredDiagnostic> {
        let _guard = self.locks.acquire(&sample.vehicle_id).await;

        let stored = self.store.record_diagnostic(sample).await?;

        let report = self.broadcaster.publish((&stored).into());
        tracing::debug!(
            vehicle_id = %stored.sample.vehicle_id,
            observers = report.delivered,
            "diagnostic ingested"
        );
        Ok(stored)
    }

    fn authorize(&self, credential: Option<&str>) -> CoreResult<()> {
        match credential {
            Some(key) if self.credentials.is_valid_credential(key) => Ok(()),
            _ => {
                tracing::warn!("telemetry rejected: missing or invalid credential");
                Err(CoreError::Unauthorized)
            }
        }
    }
}

/// Runs accepted work on its own task so a dropped request future cannot
/// abandon it halfway.
async fn detached<T, F>(work: F) -> CoreResult<T>
where
    T: Send + 'static,
    F: Future<Output = CoreResult<T>> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| CoreError::Storage(format!("ingestion task failed: {}", e)))?
}
