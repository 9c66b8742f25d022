//! Operator control surface: every call goes through the game's shared controller session.

use crate::{
    dto::control::{
        BroadcastResponse, ControllerStateResponse, OverlayUpdateRequest, PlayerPopupRequest,
    },
    error::ServiceError,
    services::{
        auth_service::AuthenticatedUser, controller_session::ControllerSession, game_service,
    },
    state::{
        SharedController, SharedState,
        channels::BroadcastChannels,
        engine::ScoreIntent,
        scoreboard::GameId,
    },
};

/// Apply a scoreboard intent and return the resulting controller view.
pub async fn apply_intent(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
    intent: ScoreIntent,
) -> Result<ControllerStateResponse, ServiceError> {
    let controller = owned_controller(state, user, game_id).await?;
    let mut session = controller.lock().await;
    authorize(&session, user)?;

    let result = session.apply(intent).await;
    release_if_deleted(state, &session);
    result?;
    Ok(view(&session))
}

/// Current controller view after catching up with pending changes.
pub async fn current_state(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<ControllerStateResponse, ServiceError> {
    let controller = owned_controller(state, user, game_id).await?;
    let mut session = controller.lock().await;
    authorize(&session, user)?;

    let result = session.sync_pending().await;
    release_if_deleted(state, &session);
    result?;
    Ok(view(&session))
}

/// Reload score and metadata from the store, discarding local knowledge.
pub async fn resync(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<ControllerStateResponse, ServiceError> {
    let controller = owned_controller(state, user, game_id).await?;
    let mut session = controller.lock().await;
    authorize(&session, user)?;

    let metadata = session.refresh_metadata().await.map(|_| ());
    release_if_deleted(state, &session);
    metadata?;
    session.resync().await?;
    Ok(view(&session))
}

/// Broadcast an overlay reposition/rescale command.
pub async fn send_overlay(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
    request: OverlayUpdateRequest,
) -> Result<BroadcastResponse, ServiceError> {
    let controller = owned_controller(state, user, game_id).await?;
    let mut session = controller.lock().await;
    authorize(&session, user)?;

    let delivered = session.send_overlay(request.position, request.scale)?;
    Ok(BroadcastResponse {
        channel: BroadcastChannels::channel_name(game_id),
        delivered,
    })
}

/// Broadcast a player highlight.
pub async fn send_player_popup(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
    request: PlayerPopupRequest,
) -> Result<BroadcastResponse, ServiceError> {
    let controller = owned_controller(state, user, game_id).await?;
    let session = controller.lock().await;
    authorize(&session, user)?;

    let (player, side) = request.into_parts();
    let delivered = session.send_player_popup(player, side)?;
    Ok(BroadcastResponse {
        channel: BroadcastChannels::channel_name(game_id),
        delivered,
    })
}

/// Controller of a game the caller owns; ownership is checked before any session starts.
async fn owned_controller(
    state: &SharedState,
    user: &AuthenticatedUser,
    game_id: GameId,
) -> Result<SharedController, ServiceError> {
    game_service::find_owned(state, user, game_id).await?;
    state.controller(game_id).await
}

fn authorize(session: &ControllerSession, user: &AuthenticatedUser) -> Result<(), ServiceError> {
    match session.metadata().user_id.as_deref() {
        Some(owner) if owner != user.id => Err(ServiceError::NotFound(format!(
            "game {}",
            session.game_id()
        ))),
        _ => Ok(()),
    }
}

fn release_if_deleted(state: &SharedState, session: &ControllerSession) {
    if session.is_deleted() {
        state.drop_controller(session.game_id());
    }
}

fn view(session: &ControllerSession) -> ControllerStateResponse {
    ControllerStateResponse {
        live: session.live().into(),
        overlay: session.overlay(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::NewGameInfo,
            score_store::{ScoreStore, memory::MemoryScoreStore},
        },
        services::auth_service::StaticTokenAuthenticator,
        state::{AppState, scoreboard::TeamSide},
    };

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            id: id.into(),
            email: None,
        }
    }

    async fn game_owned_by(owner: &str) -> (SharedState, MemoryScoreStore, GameId) {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(StaticTokenAuthenticator::default()),
        );
        let store = MemoryScoreStore::new(state.feed().clone());
        state.set_store(Arc::new(store.clone())).await;
        let game = store
            .create_game(NewGameInfo {
                title: "Opening day".into(),
                home_team: "Bears".into(),
                away_team: "Tigers".into(),
                home_bg_color: "#374151".into(),
                away_bg_color: "#f7f7f7".into(),
                home_logo_url: None,
                away_logo_url: None,
                font: None,
                field: None,
                date_time: time::macros::datetime!(2025-04-01 18:30 UTC),
                is_live: true,
                user_id: Some(owner.into()),
            })
            .await
            .expect("create game");
        (state, store, game.game_id)
    }

    #[tokio::test]
    async fn strangers_are_turned_away_before_a_session_starts() {
        let (state, store, game_id) = game_owned_by("u1").await;
        let bump = ScoreIntent::AdjustScore {
            side: TeamSide::Home,
            increment: true,
        };

        assert!(matches!(
            apply_intent(&state, &user("u2"), game_id, bump).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            current_state(&state, &user("u2"), game_id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(state.active_controllers(), 0);
        assert!(store.latest_score(game_id).await.expect("read").is_none());

        let view = apply_intent(&state, &user("u1"), game_id, bump)
            .await
            .expect("owner applies");
        assert_eq!(view.live.h_score, 1);
        assert_eq!(state.active_controllers(), 1);
    }
}
