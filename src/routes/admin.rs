use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::game::{GameInput, GameListItem},
    error::AppError,
    routes::auth::require_operator,
    services::{auth_service::AuthenticatedUser, game_service},
    state::{SharedState, scoreboard::GameId},
};

/// Game management endpoints for authenticated operators.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/games", get(list_games).post(create_game))
        .route(
            "/admin/games/{id}",
            get(get_game).put(update_game).delete(delete_game),
        )
        .route_layer(middleware::from_fn_with_state(state, require_operator))
}

/// List the games owned by the caller.
#[utoipa::path(
    get,
    path = "/admin/games",
    tag = "admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Games visible to the caller", body = [GameListItem]),
        (status = 401, description = "Missing or invalid token"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<GameListItem>>, AppError> {
    Ok(Json(game_service::list_games(&state, &user).await?))
}

/// Create a game together with its initial score row.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "admin",
    security(("bearer" = [])),
    request_body = GameInput,
    responses(
        (status = 201, description = "Game created", body = GameListItem),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Valid(Json(input)): Valid<Json<GameInput>>,
) -> Result<(StatusCode, Json<GameListItem>), AppError> {
    let created = game_service::create_game(&state, &user, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/admin/games/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game with its latest score", body = GameListItem),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
) -> Result<Json<GameListItem>, AppError> {
    Ok(Json(game_service::get_game(&state, &user, id).await?))
}

/// Replace the metadata of a game.
#[utoipa::path(
    put,
    path = "/admin/games/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    request_body = GameInput,
    responses(
        (status = 200, description = "Game updated", body = GameListItem),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn update_game(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
    Valid(Json(input)): Valid<Json<GameInput>>,
) -> Result<Json<GameListItem>, AppError> {
    Ok(Json(
        game_service::update_game(&state, &user, id, input).await?,
    ))
}

/// Delete a game, its score rows and its live sessions.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<GameId>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
