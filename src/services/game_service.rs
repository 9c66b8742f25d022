//! Game metadata management for operators: create, list, read, replace and delete.

use futures::future::join_all;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    dao::models::{GameInfoEntity, ScoreEntity},
    dto::game::{GameInput, GameListItem},
    error::ServiceError,
    services::auth_service::AuthenticatedUser,
    state::{
        SharedState,
        scoreboard::{GameId, LiveGameState},
    },
};

/// Create a game and its initial score row.
///
/// The metadata insert is authoritative: if the score row cannot be created the game is
/// still returned and the first controller session inserts the row later.
pub async fn create_game(
    state: &SharedState,
    user: &AuthenticatedUser,
    input: GameInput,
) -> Result<GameListItem, ServiceError> {
    let store = state.require_store().await?;
    let game = store
        .create_game(input.into_new_game(Some(user.id.clone())))
        .await?;
    info!(game_id = game.game_id, owner = %user.id, "game created");

    let score = match store
        .insert_score(ScoreEntity::from(&LiveGameState::new(game.game_id)))
        .await
    {
        Ok(row) => Some(row),
        Err(err) => {
            warn!(game_id = game.game_id, error = %err, "failed to create initial score row");
            None
        }
    };

    Ok(GameListItem::new(
        game,
        score.as_ref(),
        OffsetDateTime::now_utc(),
    ))
}

/// Games visible to `user`, newest first, each with its latest score.
pub async fn list_games(
    state: &SharedState,
    user: &AuthenticatedUser,
) -> Result<Vec<GameListItem>, ServiceError> {
    let store = state.require_store().await?;
    let games: Vec<GameInfoEntity> = store
        .list_games()
        .await?
        .into_iter()
        .filter(|game| is_visible_to(game, user))
        .collect();

    let scores = join_all(games.iter().map(|game| store.latest_score(game.game_id))).await;
    let now = OffsetDateTime::now_utc();

    Ok(games
        .into_iter()
        .zip(scores)
        .map(|(game, score)| {
            let score = score.unwrap_or_else(|err| {
                warn!(game_id = game.game_id, error = %err, "failed to load score for listing");
                None
            });
            GameListItem::new(game, score.as_ref(), now)
        })
        .collect())
}

/// A single game with its latest score.
pub async fn get_game(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<GameListItem, ServiceError> {
    let store = state.require_store().await?;
    let game = find_owned(state, user, game_id).await?;
    let score = store.latest_score(game_id).await?;
    Ok(GameListItem::new(
        game,
        score.as_ref(),
        OffsetDateTime::now_utc(),
    ))
}

/// Replace the metadata of a game.
pub async fn update_game(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
    input: GameInput,
) -> Result<GameListItem, ServiceError> {
    let store = state.require_store().await?;
    let existing = find_owned(state, user, game_id).await?;
    let updated = store
        .update_game(input.apply_to(existing))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    info!(game_id, "game updated");

    let score = store.latest_score(game_id).await?;
    Ok(GameListItem::new(
        updated,
        score.as_ref(),
        OffsetDateTime::now_utc(),
    ))
}

/// Delete a game, its score rows and every live session attached to it.
pub async fn delete_game(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    find_owned(state, user, game_id).await?;

    if !store.delete_game(game_id).await? {
        return Err(ServiceError::NotFound(format!("game {game_id}")));
    }

    state.drop_controller(game_id);
    state.channels().remove(game_id);
    info!(game_id, "game deleted");
    Ok(())
}

/// Load a game the caller may manage; other owners' games look missing.
pub(crate) async fn find_owned(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<GameInfoEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_game(game_id)
        .await?
        .filter(|game| is_visible_to(game, user))
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))
}

fn is_visible_to(game: &GameInfoEntity, user: &AuthenticatedUser) -> bool {
    game.user_id
        .as_deref()
        .is_none_or(|owner| owner == user.id)
}
