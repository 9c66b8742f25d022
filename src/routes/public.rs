use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::public::PublicGameResponse,
    error::AppError,
    services::public_service,
    state::{SharedState, scoreboard::GameId},
};

/// Public read-only endpoints for overlays and scoreboards.
pub fn router() -> Router<SharedState> {
    Router::new().route("/public/games/{id}", get(get_game))
}

#[utoipa::path(
    get,
    path = "/public/games/{id}",
    tag = "public",
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game metadata and live score", body = PublicGameResponse),
        (status = 404, description = "Unknown game")
    )
)]
/// Return the metadata and live scoreboard of a game.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<GameId>,
) -> Result<Json<PublicGameResponse>, AppError> {
    let payload = public_service::get_game(&state, id).await?;
    Ok(Json(payload))
}
