// Application layer - Use cases and live pipeline
pub mod auth_service;
pub mod buffer;
pub mod catalog_service;
pub mod live_feed;
pub mod live_view;
pub mod matcher;
pub mod measurement_service;
pub mod monitoring_repository;
pub mod simulator;
