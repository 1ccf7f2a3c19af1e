// Domain layer - Pure types and calculations, no I/O
pub mod error;
pub mod geo;
pub mod telemetry;
pub mod trip;
pub mod vehicle;
