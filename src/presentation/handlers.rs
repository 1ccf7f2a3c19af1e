// HTTP request handlers
use crate::application::trip_sessions::{CompleteTrip, StartTrip};
use crate::domain::telemetry::{StoredDiagnostic, StoredLocation};
use crate::domain::trip::{ActiveTrip, TripSession};
use crate::domain::vehicle::{Driver, NewDriver, NewVehicle, Vehicle, VehicleUpdate};
use crate::presentation::app_state::AppState;
use crate::presentation::http_response::ApiResult;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialQuery {
    pub api_key: Option<String>,
}

/// Header wins over the query parameter.
fn credential<'a>(headers: &'a HeaderMap, query: &'a CredentialQuery) -> Option<&'a str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query.api_key.as_deref())
}

/// Bodies that are not JSON become `null`, which the normalizer rejects as a
/// bad `payload` after the credential check.
fn telemetry_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "telemetry body is not JSON");
        Value::Null
    })
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Device location push
pub async fn ingest_location(
    headers: HeaderMap,
    Query(query): Query<CredentialQuery>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StoredLocation>)> {
    let stored = state
        .ingestion
        .ingest_location(&telemetry_body(&body), credential(&headers, &query))
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Device diagnostic (OBD) push
pub async fn ingest_diagnostic(
    headers: HeaderMap,
    Query(query): Query<CredentialQuery>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StoredDiagnostic>)> {
    let stored = state
        .ingestion
        .ingest_diagnostic(&telemetry_body(&body), credential(&headers, &query))
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn start_trip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartTrip>,
) -> ApiResult<(StatusCode, Json<TripSession>)> {
    let trip = state.ingestion.start_trip(request).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn complete_trip(
    Path(trip_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompleteTrip>,
) -> ApiResult<Json<TripSession>> {
    Ok(Json(state.ingestion.complete_trip(trip_id, request).await?))
}

pub async fn list_vehicles(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Vehicle>>> {
    Ok(Json(state.fleet.vehicles().await?))
}

pub async fn get_vehicle(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vehicle>> {
    Ok(Json(state.fleet.vehicle(&vehicle_id).await?))
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<NewVehicle>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    let vehicle = state.fleet.create_vehicle(fields).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn update_vehicle(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<VehicleUpdate>,
) -> ApiResult<Json<Vehicle>> {
    Ok(Json(state.fleet.update_vehicle(&vehicle_id, update).await?))
}

pub async fn get_driver(
    Path(driver_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Driver>> {
    Ok(Json(state.fleet.driver(&driver_id).await?))
}

pub async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<NewDriver>,
) -> ApiResult<(StatusCode, Json<Driver>)> {
    let driver = state.fleet.create_driver(fields).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

pub async fn vehicle_location(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StoredLocation>> {
    Ok(Json(state.tracking.current_location(&vehicle_id).await?))
}

pub async fn vehicle_diagnostic(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StoredDiagnostic>> {
    Ok(Json(state.tracking.current_diagnostic(&vehicle_id).await?))
}

/// Newest first
pub async fn vehicle_trips(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<TripSession>>> {
    Ok(Json(state.tracking.trips_for_vehicle(&vehicle_id).await?))
}

pub async fn vehicle_active_trip(
    Path(vehicle_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ActiveTrip>> {
    Ok(Json(state.tracking.active_trip(&vehicle_id).await?))
}

pub async fn all_locations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StoredLocation>>> {
    Ok(Json(state.tracking.all_current_locations().await?))
}

pub async fn get_trip(
    Path(trip_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<TripSession>> {
    Ok(Json(state.tracking.trip(trip_id).await?))
}

/// Oldest first
pub async fn trip_route(
    Path(trip_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StoredLocation>>> {
    Ok(Json(state.tracking.route_for_trip(trip_id).await?))
}
