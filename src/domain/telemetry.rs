// Telemetry domain models: canonical samples, stored records and notifications
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub altitude: f64,
    pub accuracy: f64,
    pub event_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSample {
    pub vehicle_id: String,
    pub rpm: f64,
    pub coolant_temp: f64,
    pub battery_voltage: f64,
    pub throttle_position: f64,
    pub fuel_level: f64,
    pub engine_load: f64,
    pub event_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Location(LocationSample),
    Diagnostic(DiagnosticSample),
}

impl TelemetryEvent {
    pub fn vehicle_id(&self) -> &str {
        match self {
            TelemetryEvent::Location(s) => &s.vehicle_id,
            TelemetryEvent::Diagnostic(s) => &s.vehicle_id,
        }
    }
}

/// A location sample as persisted: unique id, arrival time and the trip it
/// was attached to, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLocation {
    pub id: Uuid,
    pub trip_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sample: LocationSample,
}

impl StoredLocation {
    pub fn new(sample: LocationSample, trip_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            recorded_at: Utc::now(),
            sample,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDiagnostic {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sample: DiagnosticSample,
}

impl StoredDiagnostic {
    pub fn new(sample: DiagnosticSample) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            sample,
        }
    }
}

/// Change notification pushed to every observer.
///
/// Serialized with a `type` discriminator of `location` or `obd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryNotification {
    #[serde(rename = "location", rename_all = "camelCase")]
    Location {
        vehicle_id: String,
        latitude: f64,
        longitude: f64,
        speed: f64,
        heading: f64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "obd", rename_all = "camelCase")]
    Diagnostic {
        vehicle_id: String,
        rpm: f64,
        coolant_temp: f64,
        battery_voltage: f64,
        throttle_position: f64,
        fuel_level: f64,
        engine_load: f64,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryNotification {
    pub fn vehicle_id(&self) -> &str {
        match self {
            TelemetryNotification::Location { vehicle_id, .. } => vehicle_id,
            TelemetryNotification::Diagnostic { vehicle_id, .. } => vehicle_id,
        }
    }
}

impl From<&StoredLocation> for TelemetryNotification {
    fn from(stored: &StoredLocation) -> Self {
        let s = &stored.sample;
        TelemetryNotification::Location {
            vehicle_id: s.vehicle_id.clone(),
            latitude: s.latitude,
            longitude: s.longitude,
            speed: s.speed,
            heading: s.heading,
            timestamp: s.event_time,
        }
    }
}

impl From<&StoredDiagnostic> for TelemetryNotification {
    fn from(stored: &StoredDiagnostic) -> Self {
        let s = &stored.sample;
        TelemetryNotification::Diagnostic {
            vehicle_id: s.vehicle_id.clone(),
            rpm: s.rpm,
            coolant_temp: s.coolant_temp,
            battery_voltage: s.battery_voltage,
            throttle_position: s.throttle_position,
            fuel_level: s.fuel_level,
            engine_load: s.engine_load,
            timestamp: s.event_time,
        }
    }
}
