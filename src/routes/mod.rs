use axum::Router;

use crate::state::SharedState;

/// `/admin/games` management routes.
pub mod admin;
mod auth;
/// `/control/{id}` operator routes.
pub mod control;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// `/healthcheck`.
pub mod health;
/// `/public/games/{id}`.
pub mod public;
/// `/sse/games/{id}` viewer streams.
pub mod sse;

/// Compose every route tree; operator subtrees carry the bearer-token layer.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(admin::router(state.clone()))
        .merge(control::router(state.clone()))
        .merge(public::router())
        .merge(sse::router())
        .merge(docs::router());

    api_router.with_state(state)
}
