// Fleet service - Vehicle and driver administration over the directory seam
use crate::application::repository::FleetDirectory;
use crate::domain::error::{CoreError, CoreResult, ValidationError};
use crate::domain::vehicle::{Driver, NewDriver, NewVehicle, Vehicle, VehicleUpdate};
use std::sync::Arc;

#[derive(Clone)]
pub struct FleetService {
    directory: Arc<dyn FleetDirectory>,
}

impl FleetService {
    pub fn new(directory: Arc<dyn FleetDirectory>) -> Self {
        Self { directory }
    }

    pub async fn vehicles(&self) -> CoreResult<Vec<Vehicle>> {
        self.directory.get_vehicles().await
    }

    pub async fn vehicle(&self, id: &str) -> CoreResult<Vehicle> {
        self.directory
            .get_vehicle(id)
            .await?
            .ok_or_else(|| CoreError::not_found("vehicle", id))
    }

    pub async fn create_vehicle(&self, fields: NewVehicle) -> CoreResult<Vehicle> {
        let mut missing = Vec::new();
        if fields.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if fields.plate.trim().is_empty() {
            missing.push("plate".to_string());
        }
        if !missing.is_empty() {
            return Err(ValidationError::new(missing).into());
        }

        let vehicle = self.directory.create_vehicle(fields).await?;
        tracing::info!(vehicle_id = %vehicle.id, plate = %vehicle.plate, "vehicle registered");
        Ok(vehicle)
    }

    pub async fn update_vehicle(&self, id: &str, update: VehicleUpdate) -> CoreResult<Vehicle> {
        self.directory
            .update_vehicle(id, update)
            .await?
            .ok_or_else(|| CoreError::not_found("vehicle", id))
    }

    pub async fn driver(&self, id: &str) -> CoreResult<Driver> {
        self.directory
            .get_driver(id)
            .await?
            .ok_or_else(|| CoreError::not_found("driver", id))
    }

    pub async fn create_driver(&self, fields: NewDriver) -> CoreResult<Driver> {
        if fields.name.trim().is_empty() {
            return Err(ValidationError::new(vec!["name".into()]).into());
        }
        let driver = self.directory.create_driver(fields).await?;
        tracing::info!(driver_id = %driver.id, "driver registered");
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_repository::InMemoryRepository;

    fn service() -> FleetService {
        FleetService::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn test_vehicle_lifecycle() {
        let svc = service();
        let van = svc
            .create_vehicle(NewVehicle {
                name: "Van".into(),
                plate: "P1".into(),
                active: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(svc.vehicles().await.unwrap().len(), 1);
        assert_eq!(svc.vehicle(&van.id).await.unwrap().plate, "P1");

        let parked = svc
            .update_vehicle(&van.id, VehicleUpdate::active(false))
            .await
            .unwrap();
        assert!(!parked.active);
        assert_eq!(parked.name, "Van");
    }

    #[tokio::test]
    async fn test_blank_vehicle_fields_are_rejected() {
        let err = service()
            .create_vehicle(NewVehicle::default())
            .await
            .unwrap_err();
        match err {
            CoreError::Validation(v) => assert_eq!(v.fields, vec!["name", "plate"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_records_are_not_found() {
        let svc = service();
        assert!(matches!(svc.vehicle("ghost").await, Err(CoreError::NotFound { .. })));
        assert!(matches!(
            svc.update_vehicle("ghost", VehicleUpdate::default()).await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(svc.driver("ghost").await, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_driver_round_trip() {
        let svc = service();
        let driver = svc
            .create_driver(NewDriver {
                name: "Ada".into(),
                phone: Some("555".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(svc.driver(&driver.id).await.unwrap(), driver);

        assert!(matches!(
            svc.create_driver(NewDriver::default()).await,
            Err(CoreError::Validation(_))
        ));
    }
}
