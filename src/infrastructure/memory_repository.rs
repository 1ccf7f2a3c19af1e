// In-memory repository implementation
use crate::application::repository::{FleetDirectory, TripRepository, VehicleStateStore};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::telemetry::{
    DiagnosticSample, LocationSample, StoredDiagnostic, StoredLocation,
};
use crate::domain::trip::{RouteStep, TripSession};
use crate::domain::vehicle::{Driver, NewDriver, NewVehicle, Vehicle, VehicleUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Plain indexes shared by the in-memory and journal backends. No locking
/// and no I/O here; callers wrap it.
#[derive(Debug, Default)]
pub(crate) struct MemoryIndex {
    current_locations: HashMap<String, StoredLocation>,
    current_diagnostics: HashMap<String, StoredDiagnostic>,
    history: Vec<StoredLocation>,
    history_by_trip: HashMap<Uuid, Vec<usize>>,
    trips: HashMap<Uuid, TripSession>,
    trips_by_vehicle: HashMap<String, Vec<Uuid>>,
    active_by_vehicle: HashMap<String, Uuid>,
    vehicles: HashMap<String, Vehicle>,
    drivers: HashMap<String, Driver>,
}

impl MemoryIndex {
    pub(crate) fn put_location(&mut self, stored: StoredLocation) {
        if let Some(trip_id) = stored.trip_id {
            self.history_by_trip
                .entry(trip_id)
                .or_default()
                .push(self.history.len());
        }
        self.current_locations
            .insert(stored.sample.vehicle_id.clone(), stored.clone());
        self.history.push(stored);
    }

    pub(crate) fn put_diagnostic(&mut self, stored: StoredDiagnostic) {
        self.current_diagnostics
            .insert(stored.sample.vehicle_id.clone(), stored);
    }

    pub(crate) fn put_trip(&mut self, trip: TripSession) {
        if !self.trips.contains_key(&trip.id) {
            self.trips_by_vehicle
                .entry(trip.vehicle_id.clone())
                .or_default()
                .push(trip.id);
        }
        if trip.is_active() {
            self.active_by_vehicle.insert(trip.vehicle_id.clone(), trip.id);
        } else if self.active_by_vehicle.get(&trip.vehicle_id) == Some(&trip.id) {
            self.active_by_vehicle.remove(&trip.vehicle_id);
        }
        self.trips.insert(trip.id, trip);
    }

    /// A session passed along with a sample must still be stored and active.
    pub(crate) fn check_extendable(&self, trip: &TripSession) -> CoreResult<()> {
        match self.trips.get(&trip.id) {
            None => Err(CoreError::not_found("trip", trip.id.to_string())),
            Some(stored) if !stored.is_active() => Err(CoreError::Conflict(format!(
                "trip {} is no longer active",
                trip.id
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Current location plus the extended session in one step. The caller
    /// has already checked the trip exists.
    pub(crate) fn put_tracked_location(&mut self, stored: StoredLocation, trip: Option<TripSession>) {
        if let Some(trip) = trip {
            self.put_trip(trip);
        }
        self.put_location(stored);
    }

    /// Redo one recorded extension. False if the trip is unknown or closed.
    pub(crate) fn advance_trip(&mut self, trip_id: Uuid, step: &RouteStep) -> bool {
        self.trips
            .get_mut(&trip_id)
            .is_some_and(|trip| trip.apply_step(step).is_ok())
    }

    pub(crate) fn put_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    pub(crate) fn put_driver(&mut self, driver: Driver) {
        self.drivers.insert(driver.id.clone(), driver);
    }

    pub(crate) fn has_trip(&self, id: Uuid) -> bool {
        self.trips.contains_key(&id)
    }

    pub(crate) fn current_location(&self, vehicle_id: &str) -> Option<StoredLocation> {
        self.current_locations.get(vehicle_id).cloned()
    }

    pub(crate) fn current_diagnostic(&self, vehicle_id: &str) -> Option<StoredDiagnostic> {
        self.current_diagnostics.get(vehicle_id).cloned()
    }

    pub(crate) fn all_current_locations(&self) -> Vec<StoredLocation> {
        let mut all: Vec<StoredLocation> = self.current_locations.values().cloned().collect();
        all.sort_by(|a, b| a.sample.vehicle_id.cmp(&b.sample.vehicle_id));
        all
    }

    pub(crate) fn history_for_trip(&self, trip_id: Uuid) -> Vec<StoredLocation> {
        let mut route: Vec<StoredLocation> = self
            .history_by_trip
            .get(&trip_id)
            .map(|idx| idx.iter().map(|&i| self.history[i].clone()).collect())
            .unwrap_or_default();
        // Stable: equal event times keep arrival order
        route.sort_by_key(|s| s.sample.event_time);
        route
    }

    pub(crate) fn trip(&self, id: Uuid) -> Option<TripSession> {
        self.trips.get(&id).cloned()
    }

    pub(crate) fn active_trip_for_vehicle(&self, vehicle_id: &str) -> Option<TripSession> {
        self.active_by_vehicle
            .get(vehicle_id)
            .and_then(|id| self.trips.get(id))
            .cloned()
    }

    pub(crate) fn trips_for_vehicle(&self, vehicle_id: &str) -> Vec<TripSession> {
        let mut trips: Vec<TripSession> = self
            .trips_by_vehicle
            .get(vehicle_id)
            .map(|ids| ids.iter().filter_map(|id| self.trips.get(id)).cloned().collect())
            .unwrap_or_default();
        trips.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        trips
    }

    pub(crate) fn vehicles(&self) -> Vec<Vehicle> {
        let mut vehicles: Vec<Vehicle> = self.vehicles.values().cloned().collect();
        vehicles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        vehicles
    }

    pub(crate) fn vehicle(&self, id: &str) -> Option<Vehicle> {
        self.vehicles.get(id).cloned()
    }

    pub(crate) fn vehicle_by_plate(&self, plate: &str) -> Option<Vehicle> {
        self.vehicles()
            .into_iter()
            .find(|v| v.plate == plate)
    }

    pub(crate) fn driver(&self, id: &str) -> Option<Driver> {
        self.drivers.get(id).cloned()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<MemoryIndex>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryIndex> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryIndex> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VehicleStateStore for InMemoryRepository {
    async fn record_location(
        &self,
        sample: LocationSample,
        trip: Option<TripSession>,
    ) -> CoreResult<StoredLocation> {
        let mut index = self.write();
        if let Some(trip) = &trip {
            index.check_extendable(trip)?;
        }
        let stored = StoredLocation::new(sample, trip.as_ref().map(|t| t.id));
        index.put_tracked_location(stored.clone(), trip);
        Ok(stored)
    }

    async fn record_diagnostic(&self, sample: DiagnosticSample) -> CoreResult<StoredDiagnostic> {
        let stored = StoredDiagnostic::new(sample);
        self.write().put_diagnostic(stored.clone());
        Ok(stored)
    }

    async fn current_location(&self, vehicle_id: &str) -> CoreResult<Option<StoredLocation>> {
        Ok(self.read().current_location(vehicle_id))
    }

    async fn current_diagnostic(&self, vehicle_id: &str) -> CoreResult<Option<StoredDiagnostic>> {
        Ok(self.read().current_diagnostic(vehicle_id))
    }

    async fn all_current_locations(&self) -> CoreResult<Vec<StoredLocation>> {
        Ok(self.read().all_current_locations())
    }

    async fn history_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<StoredLocation>> {
        Ok(self.read().history_for_trip(trip_id))
    }
}

#[async_trait]
impl TripRepository for InMemoryRepository {
    async fn insert_trip(&self, trip: TripSession) -> CoreResult<TripSession> {
        let mut index = self.write();
        if index.has_trip(trip.id) {
            return Err(CoreError::Conflict(format!("trip {} already exists", trip.id)));
        }
        index.put_trip(trip.clone());
        Ok(trip)
    }

    async fn save_trip(&self, trip: TripSession) -> CoreResult<TripSession> {
        let mut index = self.write();
        if !index.has_trip(trip.id) {
            return Err(CoreError::not_found("trip", trip.id.to_string()));
        }
        index.put_trip(trip.clone());
        Ok(trip)
    }

    async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Option<TripSession>> {
        Ok(self.read().trip(trip_id))
    }

    async fn active_trip_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Option<TripSession>> {
        Ok(self.read().active_trip_for_vehicle(vehicle_id))
    }

    async fn trips_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<TripSession>> {
        Ok(self.read().trips_for_vehicle(vehicle_id))
    }
}

#[async_trait]
impl FleetDirectory for InMemoryRepository {
    async fn get_vehicles(&self) -> CoreResult<Vec<Vehicle>> {
        Ok(self.read().vehicles())
    }

    async fn get_vehicle(&self, id: &str) -> CoreResult<Option<Vehicle>> {
        Ok(self.read().vehicle(id))
    }

    async fn find_vehicle_by_plate(&self, plate: &str) -> CoreResult<Option<Vehicle>> {
        Ok(self.read().vehicle_by_plate(plate))
    }

    async fn create_vehicle(&self, fields: NewVehicle) -> CoreResult<Vehicle> {
        let vehicle = Vehicle::from_new(fields);
        self.write().put_vehicle(vehicle.clone());
        Ok(vehicle)
    }

    async fn update_vehicle(
        &self,
        id: &str,
        update: VehicleUpdate,
    ) -> CoreResult<Option<Vehicle>> {
        let mut index = self.write();
        let Some(mut vehicle) = index.vehicle(id) else {
            return Ok(None);
        };
        vehicle.apply(update);
        index.put_vehicle(vehicle.clone());
        Ok(Some(vehicle))
    }

    async fn get_driver(&self, id: &str) -> CoreResult<Option<Driver>> {
        Ok(self.read().driver(id))
    }

    async fn create_driver(&self, fields: NewDriver) -> CoreResult<Driver> {
        let driver = Driver::from_new(fields);
        self.write().put_driver(driver.clone());
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repository_contract as contract;

    #[tokio::test]
    async fn test_contract_current_state_overwrite() {
        contract::current_state_overwrite(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_diagnostics_keep_no_history() {
        contract::diagnostics_keep_no_history(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_trip_history_ordering() {
        contract::trip_history_ordering(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_tracked_location_is_one_write() {
        contract::tracked_location_is_one_write(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_trip_lifecycle() {
        contract::trip_lifecycle(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_trips_newest_first() {
        contract::trips_newest_first(&InMemoryRepository::new()).await;
    }

    #[tokio::test]
    async fn test_contract_fleet_directory() {
        contract::fleet_directory(&InMemoryRepository::new()).await;
    }
}
