//! Service helpers that expose read-only public projections of a game.

use time::OffsetDateTime;

use crate::{
    dto::{game::GameSummary, public::PublicGameResponse},
    error::ServiceError,
    state::{
        SharedState,
        scoreboard::{GameId, GameMetadata, LiveGameState},
    },
};

/// Return the metadata and live score of a game; a game without score row shows defaults.
pub async fn get_game(
    state: &SharedState,
    game_id: GameId,
) -> Result<PublicGameResponse, ServiceError> {
    let store = state.require_store().await?;
    let metadata: GameMetadata = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?
        .into();
    let live = store
        .latest_score(game_id)
        .await?
        .map(LiveGameState::from)
        .unwrap_or_else(|| LiveGameState::new(game_id));

    Ok(PublicGameResponse {
        game: GameSummary::from_metadata(&metadata, OffsetDateTime::now_utc()),
        live: (&live).into(),
    })
}
