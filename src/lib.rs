//! Library crate for scoreboard-back, exposing modules for binaries and integration tests.

/// Runtime settings.
pub mod config;
/// Persistence models and store backends.
pub mod dao;
/// HTTP and SSE payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared application state and the scoreboard domain.
pub mod state;
