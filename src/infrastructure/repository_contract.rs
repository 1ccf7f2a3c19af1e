// Behaviour every storage backend must share; driven from each backend's tests
use crate::application::repository::{FleetDirectory, TripRepository, VehicleStateStore};
use crate::domain::error::CoreError;
use crate::domain::telemetry::{Coords, DiagnosticSample, LocationSample, StoredLocation};
use crate::domain::trip::{TripSession, TripStatus};
use crate::domain::vehicle::{NewDriver, NewVehicle, VehicleUpdate};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
}

pub fn location(vehicle: &str, lat: f64, lng: f64, at: DateTime<Utc>) -> LocationSample {
    LocationSample {
        vehicle_id: vehicle.into(),
        latitude: lat,
        longitude: lng,
        speed: 10.0,
        heading: 0.0,
        altitude: 0.0,
        accuracy: 3.0,
        event_time: at,
    }
}

fn diagnostic(vehicle: &str, rpm: f64) -> DiagnosticSample {
    DiagnosticSample {
        vehicle_id: vehicle.into(),
        rpm,
        coolant_temp: 90.0,
        battery_voltage: 12.6,
        throttle_position: 10.0,
        fuel_level: 50.0,
        engine_load: 20.0,
        event_time: t0(),
    }
}

fn new_trip(vehicle: &str, started: DateTime<Utc>) -> TripSession {
    TripSession::start(
        vehicle.into(),
        None,
        "Depot".into(),
        Coords::new(0.0, 0.0),
        started,
    )
}

pub async fn current_state_overwrite<R: VehicleStateStore>(repo: &R) {
    assert!(repo.current_location("v1").await.unwrap().is_none());

    let mut last = None;
    for k in 1..=5 {
        let stored = repo
            .record_location(location("v1", k as f64, 0.0, t0()), None)
            .await
            .unwrap();
        let current = repo.current_location("v1").await.unwrap().unwrap();
        assert_eq!(current, stored);
        assert_ne!(Some(stored.id), last);
        last = Some(stored.id);
    }
    repo.record_location(location("v2", -1.0, 0.0, t0()), None)
        .await
        .unwrap();

    let all = repo.all_current_locations().await.unwrap();
    assert_eq!(all.len(), 2);
    let v1 = all.iter().find(|s| s.sample.vehicle_id == "v1").unwrap();
    assert_eq!(v1.sample.latitude, 5.0);
}

pub async fn diagnostics_keep_no_history<R: VehicleStateStore>(repo: &R) {
    assert!(repo.current_diagnostic("v1").await.unwrap().is_none());
    repo.record_diagnostic(diagnostic("v1", 800.0)).await.unwrap();
    let stored = repo.record_diagnostic(diagnostic("v1", 3200.0)).await.unwrap();

    assert_eq!(repo.current_diagnostic("v1").await.unwrap(), Some(stored));
    // Diagnostics never appear in location state
    assert!(repo.current_location("v1").await.unwrap().is_none());
}

/// Extend `trip` with `sample` and record both, the way ingestion does.
pub async fn track<R: VehicleStateStore>(
    repo: &R,
    trip: &mut TripSession,
    sample: LocationSample,
) -> StoredLocation {
    trip.extend(&sample).unwrap();
    repo.record_location(sample, Some(trip.clone())).await.unwrap()
}

pub async fn trip_history_ordering<R: VehicleStateStore + TripRepository>(repo: &R) {
    let mut trip = repo.insert_trip(new_trip("v1", t0())).await.unwrap();
    let mut other = repo.insert_trip(new_trip("v2", t0())).await.unwrap();

    // Arrives out of event-time order
    let late = track(repo, &mut trip, location("v1", 2.0, 0.0, t0() + Duration::seconds(20))).await;
    let early = track(repo, &mut trip, location("v1", 1.0, 0.0, t0() + Duration::seconds(10))).await;
    track(repo, &mut other, location("v2", 9.0, 0.0, t0())).await;
    repo.record_location(location("v1", 8.0, 0.0, t0()), None)
        .await
        .unwrap();

    let history = repo.history_for_trip(trip.id).await.unwrap();
    assert_eq!(history, vec![early, late]);
    assert!(repo.history_for_trip(Uuid::new_v4()).await.unwrap().is_empty());
}

pub async fn tracked_location_is_one_write<R: VehicleStateStore + TripRepository>(repo: &R) {
    let mut trip = repo.insert_trip(new_trip("v1", t0())).await.unwrap();
    let stored = track(repo, &mut trip, location("v1", 0.01, 0.0, t0())).await;

    assert_eq!(stored.trip_id, Some(trip.id));
    assert_eq!(repo.get_trip(trip.id).await.unwrap(), Some(trip.clone()));
    assert_eq!(repo.history_for_trip(trip.id).await.unwrap(), vec![stored.clone()]);

    // An unknown session rejects the sample without touching current state
    let mut stray = new_trip("v1", t0());
    stray.extend(&location("v1", 5.0, 5.0, t0())).unwrap();
    assert!(matches!(
        repo.record_location(location("v1", 5.0, 5.0, t0()), Some(stray.clone()))
            .await,
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(repo.current_location("v1").await.unwrap(), Some(stored));
    assert!(repo.get_trip(stray.id).await.unwrap().is_none());
    assert!(repo.history_for_trip(stray.id).await.unwrap().is_empty());

    // A closed session takes no more samples
    let mut closed = trip.clone();
    closed
        .complete("Yard".into(), Coords::new(0.01, 0.0), t0() + Duration::minutes(1))
        .unwrap();
    repo.save_trip(closed.clone()).await.unwrap();
    let mut reopened = trip.clone();
    reopened.extend(&location("v1", 0.02, 0.0, t0())).unwrap();
    assert!(matches!(
        repo.record_location(location("v1", 0.02, 0.0, t0()), Some(reopened)).await,
        Err(CoreError::Conflict(_))
    ));
    assert_eq!(repo.get_trip(trip.id).await.unwrap(), Some(closed));
}

pub async fn trip_lifecycle<R: TripRepository>(repo: &R) {
    let trip = repo.insert_trip(new_trip("v1", t0())).await.unwrap();
    assert!(matches!(
        repo.insert_trip(trip.clone()).await,
        Err(CoreError::Conflict(_))
    ));
    assert_eq!(
        repo.active_trip_for_vehicle("v1").await.unwrap().map(|t| t.id),
        Some(trip.id)
    );
    assert!(repo.active_trip_for_vehicle("v2").await.unwrap().is_none());

    let mut done = trip.clone();
    done.extend(&location("v1", 0.01, 0.0, t0())).unwrap();
    done.complete("Yard".into(), Coords::new(0.02, 0.0), t0() + Duration::minutes(5))
        .unwrap();
    repo.save_trip(done.clone()).await.unwrap();

    let stored = repo.get_trip(trip.id).await.unwrap().unwrap();
    assert_eq!(stored, done);
    assert_eq!(stored.status, TripStatus::Completed);
    assert!(repo.active_trip_for_vehicle("v1").await.unwrap().is_none());

    assert!(matches!(
        repo.save_trip(new_trip("v9", t0())).await,
        Err(CoreError::NotFound { .. })
    ));

    let next = repo
        .insert_trip(new_trip("v1", t0() + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(
        repo.active_trip_for_vehicle("v1").await.unwrap().map(|t| t.id),
        Some(next.id)
    );
    assert_eq!(repo.trips_for_vehicle("v1").await.unwrap().len(), 2);
}

pub async fn trips_newest_first<R: TripRepository>(repo: &R) {
    let mut ids = Vec::new();
    for hours in [1, 3, 2] {
        let mut t = new_trip("v1", t0() + Duration::hours(hours));
        t.complete("x".into(), Coords::new(0.0, 0.0), t.start_time)
            .unwrap();
        ids.push((hours, repo.insert_trip(t).await.unwrap().id));
    }
    repo.insert_trip(new_trip("v2", t0())).await.unwrap();

    let listed: Vec<Uuid> = repo
        .trips_for_vehicle("v1")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    ids.sort_by(|a, b| b.0.cmp(&a.0));
    assert_eq!(listed, ids.into_iter().map(|(_, id)| id).collect::<Vec<_>>());
}

pub async fn fleet_directory<R: FleetDirectory>(repo: &R) {
    let van = repo
        .create_vehicle(NewVehicle {
            name: "Van".into(),
            plate: "EXT-1".into(),
            active: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(repo.get_vehicle(&van.id).await.unwrap(), Some(van.clone()));
    assert_eq!(
        repo.find_vehicle_by_plate("EXT-1").await.unwrap().map(|v| v.id),
        Some(van.id.clone())
    );
    assert!(repo.find_vehicle_by_plate("ext-1").await.unwrap().is_none());

    let updated = repo
        .update_vehicle(&van.id, VehicleUpdate::active(false))
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.active);
    assert_eq!(repo.get_vehicles().await.unwrap(), vec![updated]);
    assert!(repo
        .update_vehicle("missing", VehicleUpdate::active(true))
        .await
        .unwrap()
        .is_none());

    let driver = repo
        .create_driver(NewDriver {
            name: "Sam".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(repo.get_driver(&driver.id).await.unwrap(), Some(driver));
    assert!(repo.get_driver("nobody").await.unwrap().is_none());
}
