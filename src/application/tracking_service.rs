// Tracking service - Read-side use cases for live state, trips and routes
use crate::application::repository::VehicleStateStore;
use crate::application::trip_sessions::TripSessionManager;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::telemetry::{StoredDiagnostic, StoredLocation};
use crate::domain::trip::{ActiveTrip, TripSession};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct TrackingService {
    store: Arc<dyn VehicleStateStore>,
    trips: TripSessionManager,
}

impl TrackingService {
    pub fn new(store: Arc<dyn VehicleStateStore>, trips: TripSessionManager) -> Self {
        Self { store, trips }
    }

    pub async fn current_location(&self, vehicle_id: &str) -> CoreResult<StoredLocation> {
        self.store
            .current_location(vehicle_id)
            .await?
            .ok_or_else(|| CoreError::not_found("location for vehicle", vehicle_id))
    }

    pub async fn current_diagnostic(&self, vehicle_id: &str) -> CoreResult<StoredDiagnostic> {
        self.store
            .current_diagnostic(vehicle_id)
            .await?
            .ok_or_else(|| CoreError::not_found("diagnostic for vehicle", vehicle_id))
    }

    pub async fn all_current_locations(&self) -> CoreResult<Vec<StoredLocation>> {
        self.store.all_current_locations().await
    }

    /// The open session with its running duration.
    pub async fn active_trip(&self, vehicle_id: &str) -> CoreResult<ActiveTrip> {
        let trip = self
            .trips
            .get_active(vehicle_id)
            .await?
            .ok_or_else(|| CoreError::not_found("active trip for vehicle", vehicle_id))?;
        Ok(ActiveTrip::new(trip, Utc::now()))
    }

    /// Newest first by start time.
    pub async fn trips_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<TripSession>> {
        self.trips.trips_for_vehicle(vehicle_id).await
    }

    pub async fn trip(&self, trip_id: Uuid) -> CoreResult<TripSession> {
        self.trips
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id.to_string()))
    }

    /// Oldest first by sample timestamp.
    pub async fn route_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<StoredLocation>> {
        // Distinguish an unknown trip from one with no samples yet
        self.trip(trip_id).await?;
        self.store.history_for_trip(trip_id).await
    }
}
