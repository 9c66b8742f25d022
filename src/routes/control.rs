use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::control::{
        BroadcastResponse, ControllerStateResponse, OverlayUpdateRequest, PlayerPopupRequest,
    },
    error::AppError,
    routes::auth::require_operator,
    services::{auth_service::AuthenticatedUser, control_service},
    state::{SharedState, engine::ScoreIntent, scoreboard::GameId},
};

/// Scoreboard controller endpoints for authenticated operators.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/control/{id}/intents", post(apply_intent))
        .route("/control/{id}/state", get(current_state))
        .route("/control/{id}/resync", post(resync))
        .route("/control/{id}/overlay", post(send_overlay))
        .route("/control/{id}/popup", post(send_player_popup))
        .route_layer(middleware::from_fn_with_state(state, require_operator))
}

/// Apply one scoreboard intent and persist the result.
#[utoipa::path(
    post,
    path = "/control/{id}/intents",
    tag = "control",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    request_body = ScoreIntent,
    responses(
        (status = 200, description = "Scoreboard after the intent", body = ControllerStateResponse),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "A concurrent write won; the session was resynchronized"),
        (status = 503, description = "Write failed; local state was reverted")
    )
)]
pub async fn apply_intent(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
    Json(intent): Json<ScoreIntent>,
) -> Result<Json<ControllerStateResponse>, AppError> {
    Ok(Json(
        control_service::apply_intent(&state, &user, id, intent).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/control/{id}/state",
    tag = "control",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses((status = 200, description = "Current controller view", body = ControllerStateResponse))
)]
pub async fn current_state(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
) -> Result<Json<ControllerStateResponse>, AppError> {
    Ok(Json(
        control_service::current_state(&state, &user, id).await?,
    ))
}

/// Reload score and metadata from storage.
#[utoipa::path(
    post,
    path = "/control/{id}/resync",
    tag = "control",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses((status = 200, description = "Reloaded controller view", body = ControllerStateResponse))
)]
pub async fn resync(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
) -> Result<Json<ControllerStateResponse>, AppError> {
    Ok(Json(control_service::resync(&state, &user, id).await?))
}

/// Reposition or rescale the overlay on every connected viewer.
#[utoipa::path(
    post,
    path = "/control/{id}/overlay",
    tag = "control",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    request_body = OverlayUpdateRequest,
    responses(
        (status = 200, description = "Broadcast sent", body = BroadcastResponse),
        (status = 400, description = "Scale out of bounds")
    )
)]
pub async fn send_overlay(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
    Json(request): Json<OverlayUpdateRequest>,
) -> Result<Json<BroadcastResponse>, AppError> {
    Ok(Json(
        control_service::send_overlay(&state, &user, id, request).await?,
    ))
}

/// Highlight a player on every connected viewer for a few seconds.
#[utoipa::path(
    post,
    path = "/control/{id}/popup",
    tag = "control",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    request_body = PlayerPopupRequest,
    responses(
        (status = 200, description = "Broadcast sent", body = BroadcastResponse),
        (status = 400, description = "Invalid player")
    )
)]
pub async fn send_player_popup(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
    Valid(Json(request)): Valid<Json<PlayerPopupRequest>>,
) -> Result<Json<BroadcastResponse>, AppError> {
    Ok(Json(
        control_service::send_player_popup(&state, &user, id, request).await?,
    ))
}
