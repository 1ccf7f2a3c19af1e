// Application state for HTTP handlers
use crate::application::broadcaster::Broadcaster;
use crate::application::fleet_service::FleetService;
use crate::application::ingestion_service::IngestionService;
use crate::application::tracking_service::TrackingService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    pub tracking: TrackingService,
    pub fleet: FleetService,
    pub broadcaster: Arc<Broadcaster>,
}
