// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod gps_provider;
pub mod journal_repository;
pub mod memory_repository;
#[cfg(test)]
pub mod repository_contract;
