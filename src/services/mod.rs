/// Bearer-token verification for operators.
pub mod auth_service;
/// Operator control surface over controller sessions.
pub mod control_service;
/// Controller session: optimistic scoreboard edits and ephemeral broadcasts.
pub mod controller_session;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game metadata management.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Public service for read-only game information.
pub mod public_service;
/// Server-Sent Events streaming for viewer sessions.
pub mod sse_service;
/// Storage connection supervisor with backoff.
pub mod storage_supervisor;
/// Viewer session: read-only follower of one game.
pub mod viewer_session;
