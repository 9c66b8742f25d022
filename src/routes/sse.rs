use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service,
    state::{SharedState, scoreboard::GameId},
};

#[utoipa::path(
    get,
    path = "/sse/games/{id}",
    tag = "sse",
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Viewer event stream: snapshot, live_state, game_info, overlay, player_popup, player_popup_cleared, game_deleted", content_type = "text/event-stream", body = String),
        (status = 503, description = "No storage configured yet")
    )
)]
/// Stream realtime scoreboard updates for one game to an overlay.
pub async fn viewer_stream(
    State(state): State<SharedState>,
    Path(id): Path<GameId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = sse_service::open_viewer(&state, id).await?;
    info!(viewer = %session.id(), game_id = id, "new viewer SSE connection");
    Ok(sse_service::to_sse_stream(session, state.is_degraded()))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/games/{id}", get(viewer_stream))
}
