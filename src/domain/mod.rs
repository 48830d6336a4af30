// Domain layer - Core business models
pub mod auth;
pub mod catalog;
pub mod filter;
pub mod measurement;
pub mod simulation;
