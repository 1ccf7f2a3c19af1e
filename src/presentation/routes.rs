// Router construction
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    all_locations, complete_trip, create_driver, create_vehicle, get_driver, get_trip,
    get_vehicle, health_check, ingest_diagnostic, ingest_location, list_vehicles, start_trip,
    trip_route, update_vehicle, vehicle_active_trip, vehicle_diagnostic, vehicle_location,
    vehicle_trips,
};
use crate::presentation::websocket::telemetry_socket;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/telemetry/location", post(ingest_location))
        .route("/api/telemetry/obd", post(ingest_diagnostic))
        .route("/api/trips", post(start_trip))
        .route("/api/trips/:id", get(get_trip))
        .route("/api/trips/:id/complete", post(complete_trip))
        .route("/api/trips/:id/route", get(trip_route))
        .route("/api/vehicles", get(list_vehicles).post(create_vehicle))
        .route("/api/vehicles/:id", get(get_vehicle).patch(update_vehicle))
        .route("/api/vehicles/:id/location", get(vehicle_location))
        .route("/api/vehicles/:id/obd", get(vehicle_diagnostic))
        .route("/api/vehicles/:id/trips", get(vehicle_trips))
        .route("/api/vehicles/:id/trips/active", get(vehicle_active_trip))
        .route("/api/locations", get(all_locations))
        .route("/api/drivers", post(create_driver))
        .route("/api/drivers/:id", get(get_driver))
        .route("/ws", get(telemetry_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
