// Trip session domain model and the per-sample extension algorithm
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::geo::distance_miles;
use crate::domain::telemetry::{Coords, LocationSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    /// Reserved, never entered.
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl RoutePoint {
    pub fn coords(&self) -> Coords {
        Coords::new(self.lat, self.lng)
    }
}

/// The effect of one sample on a session: the point it appended and the
/// aggregates right after. Enough to redo an extension without the route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub point: RoutePoint,
    pub distance: f64,
    pub max_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSession {
    pub id: Uuid,
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    pub status: TripStatus,
    pub start_location: String,
    pub start_coords: Coords,
    pub end_location: Option<String>,
    /// Tracks the live position while active, replaced by the caller's end
    /// coordinates on completion.
    pub end_coords: Option<Coords>,
    pub route: Vec<RoutePoint>,
    /// Cumulative miles.
    pub distance: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    /// Seconds; set on completion.
    pub duration: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TripSession {
    /// Opens a session. The start coordinates are the first route point so
    /// the first reported sample is measured from where the trip began.
    pub fn start(
        vehicle_id: String,
        driver_id: Option<String>,
        start_location: String,
        start_coords: Coords,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            driver_id,
            status: TripStatus::Active,
            start_location,
            start_coords,
            end_location: None,
            end_coords: None,
            route: vec![RoutePoint {
                lat: start_coords.lat,
                lng: start_coords.lng,
                timestamp: now,
            }],
            distance: 0.0,
            max_speed: 0.0,
            avg_speed: 0.0,
            duration: 0,
            start_time: now,
            end_time: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    /// Appends a sample to the route and folds it into the aggregates.
    /// Returns the length of the segment just added, in miles.
    pub fn extend(&mut self, sample: &LocationSample) -> CoreResult<f64> {
        self.ensure_active()?;

        let point = RoutePoint {
            lat: sample.latitude,
            lng: sample.longitude,
            timestamp: sample.event_time,
        };
        let segment = self
            .route
            .last()
            .map(|prev| distance_miles(prev.lat, prev.lng, point.lat, point.lng))
            .unwrap_or(0.0);

        self.route.push(point);
        self.distance += segment;
        self.max_speed = self.max_speed.max(sample.speed);
        self.end_coords = Some(point.coords());

        Ok(segment)
    }

    /// Freezes the session. Duration and average speed are derived here only.
    pub fn complete(
        &mut self,
        end_location: String,
        end_coords: Coords,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_active()?;

        self.end_location = Some(end_location);
        self.end_coords = Some(end_coords);
        self.end_time = Some(now);
        self.duration = (now - self.start_time).num_seconds().max(0);
        self.avg_speed = if self.duration > 0 {
            self.distance / (self.duration as f64 / 3600.0)
        } else {
            0.0
        };
        self.status = TripStatus::Completed;

        Ok(())
    }

    /// The most recent extension, if the session has any route at all.
    pub fn last_step(&self) -> Option<RouteStep> {
        self.route.last().map(|point| RouteStep {
            point: *point,
            distance: self.distance,
            max_speed: self.max_speed,
        })
    }

    /// Redo an extension recorded by `last_step`.
    pub fn apply_step(&mut self, step: &RouteStep) -> CoreResult<()> {
        self.ensure_active()?;
        self.route.push(step.point);
        self.distance = step.distance;
        self.max_speed = step.max_speed;
        self.end_coords = Some(step.point.coords());
        Ok(())
    }

    /// Elapsed seconds for display; not persisted while active.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.end_time {
            Some(_) => self.duration,
            None => (now - self.start_time).num_seconds().max(0),
        }
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!("trip {} is no longer active", self.id)))
        }
    }
}

/// An active session together with its live elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTrip {
    #[serde(flatten)]
    pub trip: TripSession,
    pub elapsed_seconds: i64,
}

impl ActiveTrip {
    pub fn new(trip: TripSession, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = trip.elapsed_seconds(now);
        Self {
            trip,
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn sample(lat: f64, lng: f64, speed: f64, minutes: i64) -> LocationSample {
        LocationSample {
            vehicle_id: "v1".into(),
            latitude: lat,
            longitude: lng,
            speed,
            heading: 0.0,
            altitude: 0.0,
            accuracy: 0.0,
            event_time: t0() + Duration::minutes(minutes),
        }
    }

    fn trip() -> TripSession {
        TripSession::start(
            "v1".into(),
            Some("d1".into()),
            "A St".into(),
            Coords::new(40.7485, -73.9883),
            t0(),
        )
    }

    #[test]
    fn test_start_seeds_route_with_origin() {
        let trip = trip();
        assert!(trip.is_active());
        assert_eq!(trip.route.len(), 1);
        assert_eq!(trip.route[0].coords(), trip.start_coords);
        assert_eq!(trip.distance, 0.0);
        assert_eq!(trip.max_speed, 0.0);
        assert!(trip.end_time.is_none());
    }

    #[test]
    fn test_extend_accumulates_distance_from_origin() {
        let mut trip = trip();
        let segment = trip.extend(&sample(40.7580, -73.9855, 40.0, 1)).unwrap();

        let expected = distance_miles(40.7485, -73.9883, 40.7580, -73.9855);
        assert!((segment - expected).abs() < 1e-12);
        assert!((trip.distance - expected).abs() < 1e-12);
        assert_eq!(trip.max_speed, 40.0);
        assert_eq!(trip.end_coords, Some(Coords::new(40.7580, -73.9855)));
    }

    #[test]
    fn test_distance_is_sum_of_consecutive_segments() {
        let mut trip = trip();
        let points = [
            (40.7500, -73.9870, 12.0),
            (40.7550, -73.9860, 33.0),
            (40.7550, -73.9860, 0.0),
            (40.7610, -73.9800, 21.0),
        ];
        let mut last = 0.0;
        for (i, (lat, lng, speed)) in points.iter().enumerate() {
            trip.extend(&sample(*lat, *lng, *speed, i as i64)).unwrap();
            assert!(trip.distance >= last);
            last = trip.distance;
        }

        let expected: f64 = trip
            .route
            .windows(2)
            .map(|w| distance_miles(w[0].lat, w[0].lng, w[1].lat, w[1].lng))
            .sum();
        assert!((trip.distance - expected).abs() < 1e-9);
        assert_eq!(trip.max_speed, 33.0);
        assert_eq!(trip.route.len(), 5);
    }

    #[test]
    fn test_complete_derives_duration_and_average() {
        let mut trip = trip();
        trip.extend(&sample(40.7580, -73.9855, 40.0, 1)).unwrap();
        let end = t0() + Duration::minutes(30);
        trip.complete("B Ave".into(), Coords::new(40.76, -73.98), end)
            .unwrap();

        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.duration, 1800);
        assert_eq!(trip.end_time, Some(end));
        assert_eq!(trip.end_coords, Some(Coords::new(40.76, -73.98)));
        assert!((trip.avg_speed - trip.distance * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_completed_trip_rejects_mutation() {
        let mut trip = trip();
        trip.complete("B Ave".into(), Coords::new(40.76, -73.98), t0())
            .unwrap();
        let frozen = trip.clone();

        assert!(matches!(
            trip.extend(&sample(41.0, -74.0, 90.0, 5)),
            Err(CoreError::Conflict(_))
        ));
        assert!(trip
            .complete("C Rd".into(), Coords::new(0.0, 0.0), t0())
            .is_err());
        assert_eq!(trip, frozen);
        assert_eq!(trip.avg_speed, 0.0);
    }

    #[test]
    fn test_replayed_steps_rebuild_the_session() {
        let mut live = trip();
        let mut replayed = trip();
        for (i, (lat, lng, speed)) in [(40.75, -73.98, 20.0), (40.76, -73.97, 35.0), (40.76, -73.97, 5.0)]
            .into_iter()
            .enumerate()
        {
            live.extend(&sample(lat, lng, speed, i as i64)).unwrap();
            replayed.apply_step(&live.last_step().unwrap()).unwrap();
        }
        assert_eq!(replayed, live);

        live.complete("B Ave".into(), Coords::new(40.76, -73.97), t0())
            .unwrap();
        let step = live.last_step().unwrap();
        assert!(live.apply_step(&step).is_err());
    }

    #[test]
    fn test_active_view_reports_elapsed_time() {
        let view = ActiveTrip::new(trip(), t0() + Duration::seconds(95));
        assert_eq!(view.elapsed_seconds, 95);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["elapsedSeconds"], 95);
        assert_eq!(json["status"], "active");
        assert_eq!(json["vehicleId"], "v1");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(trip()).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["startCoords"]["lat"], 40.7485);
    }
}
