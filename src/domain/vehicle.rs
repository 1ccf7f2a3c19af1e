// Fleet administration records the core only references
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub plate: String,
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub driver_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub name: String,
    pub plate: String,
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub driver_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Vehicle {
    pub fn from_new(fields: NewVehicle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            plate: fields.plate,
            vin: fields.vin,
            make: fields.make,
            model: fields.model,
            year: fields.year,
            driver_id: fields.driver_id,
            active: fields.active,
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: VehicleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(plate) = update.plate {
            self.plate = plate;
        }
        if update.vin.is_some() {
            self.vin = update.vin;
        }
        if update.make.is_some() {
            self.make = update.make;
        }
        if update.model.is_some() {
            self.model = update.model;
        }
        if update.year.is_some() {
            self.year = update.year;
        }
        if update.driver_id.is_some() {
            self.driver_id = update.driver_id;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub name: Option<String>,
    pub plate: Option<String>,
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub driver_id: Option<String>,
    pub active: Option<bool>,
}

impl VehicleUpdate {
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub license_number: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    pub name: String,
    pub license_number: Option<String>,
    pub phone: Option<String>,
}

impl Driver {
    pub fn from_new(fields: NewDriver) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            license_number: fields.license_number,
            phone: fields.phone,
        }
    }
}
