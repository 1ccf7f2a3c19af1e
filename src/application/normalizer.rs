// Telemetry normalizer - Shapes untyped device payloads into canonical samples
use crate::domain::error::ValidationError;
use crate::domain::telemetry::{DiagnosticSample, LocationSample};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Validate a raw location payload. Absent numeric fields default to 0 and
/// an absent `eventTime` defaults to now.
pub fn normalize_location(raw: &Value) -> Result<LocationSample, ValidationError> {
    normalize_location_at(raw, Utc::now())
}

pub fn normalize_diagnostic(raw: &Value) -> Result<DiagnosticSample, ValidationError> {
    normalize_diagnostic_at(raw, Utc::now())
}

pub fn normalize_location_at(
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<LocationSample, ValidationError> {
    let mut reader = FieldReader::new(raw)?;

    let vehicle_id = reader.vehicle_id();
    let latitude = reader.number("latitude");
    let longitude = reader.number("longitude");
    let speed = reader.number("speed");
    let heading = reader.number("heading");
    let altitude = reader.number("altitude");
    let accuracy = reader.number("accuracy");
    let event_time = reader.event_time(now);

    if !(-90.0..=90.0).contains(&latitude) {
        reader.reject("latitude");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        reader.reject("longitude");
    }
    reader.non_negative("speed", speed);

    reader.finish()?;
    Ok(LocationSample {
        vehicle_id,
        latitude,
        longitude,
        speed,
        heading,
        altitude,
        accuracy,
        event_time,
    })
}

/// Percentage fields are only checked for sign; values over 100 pass through.
pub fn normalize_diagnostic_at(
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<DiagnosticSample, ValidationError> {
    let mut reader = FieldReader::new(raw)?;

    let vehicle_id = reader.vehicle_id();
    let rpm = reader.number("rpm");
    let coolant_temp = reader.number("coolantTemp");
    let battery_voltage = reader.number("batteryVoltage");
    let throttle_position = reader.number("throttlePosition");
    let fuel_level = reader.number("fuelLevel");
    let engine_load = reader.number("engineLoad");
    let event_time = reader.event_time(now);

    reader.non_negative("rpm", rpm);
    reader.non_negative("throttlePosition", throttle_position);
    reader.non_negative("fuelLevel", fuel_level);
    reader.non_negative("engineLoad", engine_load);

    reader.finish()?;
    Ok(DiagnosticSample {
        vehicle_id,
        rpm,
        coolant_temp,
        battery_voltage,
        throttle_position,
        fuel_level,
        engine_load,
        event_time,
    })
}

/// Collects every bad field so the caller sees all of them at once.
struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    rejected: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(raw: &'a Value) -> Result<Self, ValidationError> {
        match raw.as_object() {
            Some(fields) => Ok(Self {
                fields,
                rejected: Vec::new(),
            }),
            None => Err(ValidationError::new(vec!["payload".to_string()])),
        }
    }

    /// Looks up `name`, falling back to its snake_case spelling.
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields
            .get(name)
            .or_else(|| self.fields.get(&to_snake_case(name)))
            .filter(|v| !v.is_null())
    }

    fn reject(&mut self, name: &str) {
        if !self.rejected.iter().any(|f| f == name) {
            self.rejected.push(name.to_string());
        }
    }

    fn vehicle_id(&mut self) -> String {
        let id = match self.get("vehicleId") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if id.is_empty() {
            self.reject("vehicleId");
        }
        id
    }

    fn number(&mut self, name: &str) -> f64 {
        let parsed = match self.get(name) {
            None => return 0.0,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(v) if v.is_finite() => v,
            _ => {
                self.reject(name);
                0.0
            }
        }
    }

    fn non_negative(&mut self, name: &str, value: f64) {
        if value < 0.0 {
            self.reject(name);
        }
    }

    /// RFC 3339 string or epoch milliseconds; `timestamp` is accepted as an alias.
    fn event_time(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let (name, value) = match self.get("eventTime") {
            Some(v) => ("eventTime", v),
            None => match self.get("timestamp") {
                Some(v) => ("timestamp", v),
                None => return now,
            },
        };

        let parsed = match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        };
        match parsed {
            Some(t) => t,
            None => {
                self.reject(name);
                now
            }
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.rejected.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.rejected))
        }
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_location_defaults_missing_fields() {
        let sample =
            normalize_location_at(&json!({"vehicleId": "v1", "latitude": 40.7}), now()).unwrap();
        assert_eq!(sample.vehicle_id, "v1");
        assert_eq!(sample.latitude, 40.7);
        assert_eq!(sample.longitude, 0.0);
        assert_eq!(sample.speed, 0.0);
        assert_eq!(sample.event_time, now());
    }

    #[test]
    fn test_location_accepts_numeric_strings_and_snake_case() {
        let sample = normalize_location_at(
            &json!({
                "vehicle_id": "v9",
                "latitude": "51.5",
                "longitude": "-0.12",
                "speed": "27.5",
                "event_time": "2024-05-01T09:00:00Z"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(sample.vehicle_id, "v9");
        assert_eq!(sample.longitude, -0.12);
        assert_eq!(sample.speed, 27.5);
        assert_eq!(
            sample.event_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_latitude_out_of_range_is_rejected() {
        let err = normalize_location_at(
            &json!({"vehicleId": "v1", "latitude": 200, "longitude": 10}),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.fields, vec!["latitude"]);
    }

    #[test]
    fn test_all_bad_fields_are_reported() {
        let err = normalize_location_at(
            &json!({"latitude": "north", "longitude": -181, "speed": -3}),
            now(),
        )
        .unwrap_err();
        assert!(err.references("vehicleId"));
        assert!(err.references("latitude"));
        assert!(err.references("longitude"));
        assert!(err.references("speed"));
    }

    #[test]
    fn test_blank_vehicle_id_is_rejected() {
        let err = normalize_location_at(&json!({"vehicleId": "  "}), now()).unwrap_err();
        assert_eq!(err.fields, vec!["vehicleId"]);
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let err = normalize_diagnostic_at(&json!([1, 2, 3]), now()).unwrap_err();
        assert_eq!(err.fields, vec!["payload"]);
    }

    #[test]
    fn test_non_finite_strings_are_rejected() {
        let err = normalize_location_at(&json!({"vehicleId": "v1", "heading": "NaN"}), now())
            .unwrap_err();
        assert_eq!(err.fields, vec!["heading"]);
    }

    #[test]
    fn test_epoch_millis_event_time() {
        let sample = normalize_location_at(
            &json!({"vehicleId": "v1", "timestamp": 1_714_550_400_000i64}),
            now(),
        )
        .unwrap();
        assert_eq!(
            sample.event_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_event_time_is_rejected() {
        let err = normalize_location_at(&json!({"vehicleId": "v1", "eventTime": "yesterday"}), now())
            .unwrap_err();
        assert_eq!(err.fields, vec!["eventTime"]);
    }

    #[test]
    fn test_diagnostic_percentages_over_100_pass_through() {
        let sample = normalize_diagnostic_at(
            &json!({"vehicleId": "v1", "rpm": 3000, "fuelLevel": 140, "engineLoad": 101.5}),
            now(),
        )
        .unwrap();
        assert_eq!(sample.fuel_level, 140.0);
        assert_eq!(sample.engine_load, 101.5);
        assert_eq!(sample.coolant_temp, 0.0);
    }

    #[test]
    fn test_diagnostic_negative_rpm_is_rejected() {
        let err = normalize_diagnostic_at(&json!({"vehicleId": "v1", "rpm": -1}), now())
            .unwrap_err();
        assert_eq!(err.fields, vec!["rpm"]);
    }
}
