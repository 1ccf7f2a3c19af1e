// Application layer - Use cases and the seams adapters plug into
pub mod broadcaster;
pub mod credentials;
pub mod fleet_service;
pub mod ingestion_service;
pub mod normalizer;
pub mod reconciler;
pub mod repository;
pub mod tracking_service;
pub mod trip_sessions;
pub mod vehicle_locks;
