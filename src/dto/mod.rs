use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Operator control payloads.
pub mod control;
/// Game management payloads.
pub mod game;
/// Health check payload.
pub mod health;
/// Unauthenticated read models.
pub mod public;
/// Viewer stream events.
pub mod sse;
/// Custom field validators.
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
