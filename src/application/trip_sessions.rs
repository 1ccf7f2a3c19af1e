// Trip session manager - none -> active -> completed lifecycle per vehicle
use crate::application::repository::TripRepository;
use crate::domain::error::{CoreError, CoreResult, ValidationError};
use crate::domain::telemetry::{Coords, LocationSample};
use crate::domain::trip::TripSession;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrip {
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    #[serde(default)]
    pub start_location: String,
    pub start_coords: Coords,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTrip {
    #[serde(default)]
    pub end_location: String,
    pub end_coords: Coords,
}

/// Callers must hold the vehicle's lock around every mutating call.
#[derive(Clone)]
pub struct TripSessionManager {
    trips: Arc<dyn TripRepository>,
}

impl TripSessionManager {
    pub fn new(trips: Arc<dyn TripRepository>) -> Self {
        Self { trips }
    }

    pub async fn start_trip(&self, request: StartTrip) -> CoreResult<TripSession> {
        validate_start(&request)?;

        if let Some(active) = self.trips.active_trip_for_vehicle(&request.vehicle_id).await? {
            return Err(CoreError::Conflict(format!(
                "vehicle {} already has active trip {}",
                request.vehicle_id, active.id
            )));
        }

        let trip = TripSession::start(
            request.vehicle_id,
            request.driver_id,
            request.start_location,
            request.start_coords,
            Utc::now(),
        );
        let trip = self.trips.insert_trip(trip).await?;
        tracing::info!(trip_id = %trip.id, vehicle_id = %trip.vehicle_id, "trip started");
        Ok(trip)
    }

    pub async fn complete_trip(&self, trip_id: Uuid, request: CompleteTrip) -> CoreResult<TripSession> {
        let mut trip = self
            .trips
            .get_trip(trip_id)
            .await?
            .filter(TripSession::is_active)
            .ok_or_else(|| CoreError::not_found("active trip", trip_id.to_string()))?;

        trip.complete(request.end_location, request.end_coords, Utc::now())?;
        let trip = self.trips.save_trip(trip).await?;
        tracing::info!(
            trip_id = %trip.id,
            vehicle_id = %trip.vehicle_id,
            distance = trip.distance,
            duration = trip.duration,
            "trip completed"
        );
        Ok(trip)
    }

    pub async fn get_active(&self, vehicle_id: &str) -> CoreResult<Option<TripSession>> {
        self.trips.active_trip_for_vehicle(vehicle_id).await
    }

    /// The trip a sample belongs to. Samples carry no trip id, so this is
    /// whichever trip is active for the vehicle at ingestion time.
    pub async fn correlate(&self, sample: &LocationSample) -> CoreResult<Option<TripSession>> {
        self.get_active(&sample.vehicle_id).await
    }

    /// `trip` extended with `sample`, not yet stored. The caller commits it
    /// together with the sample so the pair lands as one write.
    pub fn advance(&self, trip: &TripSession, sample: &LocationSample) -> CoreResult<TripSession> {
        let mut next = trip.clone();
        let segment = next.extend(sample)?;
        tracing::debug!(
            trip_id = %next.id,
            segment_miles = segment,
            distance = next.distance,
            "trip extended"
        );
        Ok(next)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Option<TripSession>> {
        self.trips.get_trip(trip_id).await
    }

    pub async fn trips_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<TripSession>> {
        self.trips.trips_for_vehicle(vehicle_id).await
    }
}

fn validate_start(request: &StartTrip) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    if request.vehicle_id.trim().is_empty() {
        fields.push("vehicleId".to_string());
    }
    let c = request.start_coords;
    if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng) {
        fields.push("startCoords".to_string());
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trip::TripStatus;
    use crate::infrastructure::memory_repository::InMemoryRepository;

    fn manager() -> TripSessionManager {
        TripSessionManager::new(Arc::new(InMemoryRepository::new()))
    }

    fn start(vehicle: &str) -> StartTrip {
        StartTrip {
            vehicle_id: vehicle.into(),
            driver_id: Some("d1".into()),
            start_location: "A St".into(),
            start_coords: Coords::new(40.7485, -73.9883),
        }
    }

    fn sample(lat: f64, lng: f64, speed: f64) -> LocationSample {
        LocationSample {
            vehicle_id: "v1".into(),
            latitude: lat,
            longitude: lng,
            speed,
            heading: 0.0,
            altitude: 0.0,
            accuracy: 0.0,
            event_time: Utc::now(),
        }
    }

    fn finish() -> CompleteTrip {
        CompleteTrip {
            end_location: "B Ave".into(),
            end_coords: Coords::new(40.76, -73.98),
        }
    }

    #[tokio::test]
    async fn test_second_start_conflicts() {
        let manager = manager();
        let first = manager.start_trip(start("v1")).await.unwrap();
        let second = manager.start_trip(start("v1")).await;

        assert!(matches!(second, Err(CoreError::Conflict(_))));
        let trips = manager.trips_for_vehicle("v1").await.unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].id, first.id);
        assert_eq!(trips[0].status, TripStatus::Active);
    }

    #[tokio::test]
    async fn test_other_vehicle_can_start_independently() {
        let manager = manager();
        manager.start_trip(start("v1")).await.unwrap();
        assert!(manager.start_trip(start("v2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_complete_unknown_trip_is_not_found() {
        let manager = manager();
        let err = manager.complete_trip(Uuid::new_v4(), finish()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_complete_twice_is_not_found() {
        let manager = manager();
        let trip = manager.start_trip(start("v1")).await.unwrap();
        manager.complete_trip(trip.id, finish()).await.unwrap();

        let err = manager.complete_trip(trip.id, finish()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_restart_after_completion() {
        let manager = manager();
        let trip = manager.start_trip(start("v1")).await.unwrap();
        manager.complete_trip(trip.id, finish()).await.unwrap();

        let again = manager.start_trip(start("v1")).await.unwrap();
        assert_ne!(again.id, trip.id);
        assert_eq!(manager.get_active("v1").await.unwrap().unwrap().id, again.id);
    }

    #[tokio::test]
    async fn test_advance_leaves_stored_trip_alone() {
        let manager = manager();
        let trip = manager.start_trip(start("v1")).await.unwrap();

        let active = manager.correlate(&sample(40.7580, -73.9855, 40.0)).await.unwrap().unwrap();
        let next = manager.advance(&active, &sample(40.7580, -73.9855, 40.0)).unwrap();
        assert!((next.distance - 0.6726).abs() < 0.001);
        assert_eq!(next.max_speed, 40.0);
        assert_eq!(next.route.len(), 2);

        let stored = manager.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored, trip);
    }

    #[tokio::test]
    async fn test_invalid_start_is_rejected() {
        let manager = manager();
        let mut request = start(" ");
        request.start_coords = Coords::new(95.0, 0.0);

        match manager.start_trip(request).await {
            Err(CoreError::Validation(err)) => {
                assert_eq!(err.fields, vec!["vehicleId", "startCoords"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
