// Repository traits for vehicle state, trips and fleet records
use crate::domain::error::CoreResult;
use crate::domain::telemetry::{
    DiagnosticSample, LocationSample, StoredDiagnostic, StoredLocation,
};
use crate::domain::trip::TripSession;
use crate::domain::vehicle::{Driver, NewDriver, NewVehicle, Vehicle, VehicleUpdate};
use async_trait::async_trait;
use uuid::Uuid;

/// System of record for current state and location history.
#[async_trait]
pub trait VehicleStateStore: Send + Sync {
    /// Assign an id and arrival time, overwrite the vehicle's current
    /// location and append to history.
    ///
    /// `trip` is the vehicle's active session already extended with this
    /// sample. The history entry is tagged with its id and the session is
    /// stored in the same write, so either both land or neither does. An
    /// unknown trip is `NotFound` and nothing is written.
    async fn record_location(
        &self,
        sample: LocationSample,
        trip: Option<TripSession>,
    ) -> CoreResult<StoredLocation>;

    /// Overwrite the vehicle's current diagnostic; no history is kept
    async fn record_diagnostic(&self, sample: DiagnosticSample) -> CoreResult<StoredDiagnostic>;

    async fn current_location(&self, vehicle_id: &str) -> CoreResult<Option<StoredLocation>>;

    async fn current_diagnostic(&self, vehicle_id: &str) -> CoreResult<Option<StoredDiagnostic>>;

    /// Latest location of every vehicle that has reported one
    async fn all_current_locations(&self) -> CoreResult<Vec<StoredLocation>>;

    /// Samples attached to a trip, ordered by event time ascending
    async fn history_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<StoredLocation>>;
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn insert_trip(&self, trip: TripSession) -> CoreResult<TripSession>;

    /// Replace a stored trip wholesale
    async fn save_trip(&self, trip: TripSession) -> CoreResult<TripSession>;

    async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Option<TripSession>>;

    async fn active_trip_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Option<TripSession>>;

    /// All trips for a vehicle, newest start time first
    async fn trips_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<TripSession>>;
}

/// Administration records owned by the fleet layer.
#[async_trait]
pub trait FleetDirectory: Send + Sync {
    async fn get_vehicles(&self) -> CoreResult<Vec<Vehicle>>;

    async fn get_vehicle(&self, id: &str) -> CoreResult<Option<Vehicle>>;

    /// Exact, case-sensitive plate match
    async fn find_vehicle_by_plate(&self, plate: &str) -> CoreResult<Option<Vehicle>>;

    async fn create_vehicle(&self, fields: NewVehicle) -> CoreResult<Vehicle>;

    async fn update_vehicle(&self, id: &str, update: VehicleUpdate)
        -> CoreResult<Option<Vehicle>>;

    async fn get_driver(&self, id: &str) -> CoreResult<Option<Driver>>;

    async fn create_driver(&self, fields: NewDriver) -> CoreResult<Driver>;
}
