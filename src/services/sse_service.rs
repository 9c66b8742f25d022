use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use time::OffsetDateTime;
use tokio::{sync::mpsc, time::Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        control::LiveStateDto,
        game::GameSummary,
        sse::{GameDeletedEvent, PlayerPopupEvent, ServerEvent},
    },
    error::ServiceError,
    services::viewer_session::{ViewerOptions, ViewerSession, ViewerUpdate},
    state::{SharedState, scoreboard::GameId},
};

/// Start a viewer session for `game_id`.
///
/// Fails when no store was ever installed or when the store reports the game as unknown.
/// An unhealthy store still yields a session showing defaults.
pub async fn open_viewer(
    state: &SharedState,
    game_id: GameId,
) -> Result<ViewerSession, ServiceError> {
    let store = state.store().await.ok_or(ServiceError::Degraded)?;
    let session = ViewerSession::connect(
        store,
        state.feed(),
        state.channels(),
        game_id,
        ViewerOptions::from(state.config()),
    )
    .await;
    if session.game_missing() {
        return Err(ServiceError::NotFound(format!("game {game_id}")));
    }
    Ok(session)
}

/// Initial `snapshot` event describing everything a freshly connected overlay must draw.
pub fn snapshot_event(session: &ViewerSession, degraded: bool) -> Option<ServerEvent> {
    encode(
        "snapshot",
        &session.snapshot(degraded, OffsetDateTime::now_utc()),
    )
}

/// Translate a viewer update into its named SSE event.
pub fn update_event(game_id: GameId, update: &ViewerUpdate) -> Option<ServerEvent> {
    match update {
        ViewerUpdate::Score(live) => encode("live_state", &LiveStateDto::from(live)),
        ViewerUpdate::GameInfo(metadata) => encode(
            "game_info",
            &GameSummary::from_metadata(metadata, OffsetDateTime::now_utc()),
        ),
        ViewerUpdate::GameDeleted => encode("game_deleted", &GameDeletedEvent { game_id }),
        ViewerUpdate::Overlay(overlay) => encode("overlay", overlay),
        ViewerUpdate::Spotlight(spotlight) => encode(
            "player_popup",
            &PlayerPopupEvent {
                player: spotlight.player.clone(),
                side: spotlight.side,
                duration_ms: spotlight.remaining(Instant::now()).as_millis() as u64,
            },
        ),
        ViewerUpdate::SpotlightExpired => encode("player_popup_cleared", &serde_json::json!({})),
    }
}

fn encode<T: serde::Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to encode SSE payload");
            None
        }
    }
}

/// Drive a viewer session and stream its updates as SSE, stopping when the client
/// disconnects or the session ends.
pub fn to_sse_stream(
    mut session: ViewerSession,
    degraded: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let game_id = session.game_id();
        let viewer = session.id();

        if let Some(snapshot) = snapshot_event(&session, degraded) {
            if tx.send(Ok(to_event(snapshot))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                update = session.next_update() => {
                    let Some(update) = update else { break };
                    let Some(payload) = update_event(game_id, &update) else { continue };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(%viewer, game_id, "viewer SSE stream closed");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::score_store::memory::MemoryScoreStore,
        services::auth_service::StaticTokenAuthenticator,
        state::{
            AppState,
            overlay::{OverlayDisplayState, OverlayPosition, PlayerRef, PlayerSpotlight},
            scoreboard::{LiveGameState, TeamSide},
        },
    };

    #[tokio::test]
    async fn unknown_games_are_rejected_without_leaving_a_channel() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(StaticTokenAuthenticator::default()),
        );
        let store = MemoryScoreStore::new(state.feed().clone());
        state.set_store(Arc::new(store.clone())).await;

        for game_id in 100..110 {
            assert!(matches!(
                open_viewer(&state, game_id).await,
                Err(ServiceError::NotFound(_))
            ));
        }
        assert_eq!(state.channels().open_channels(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_still_opens_a_viewer_with_defaults() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(StaticTokenAuthenticator::default()),
        );
        let store = MemoryScoreStore::new(state.feed().clone());
        state.set_store(Arc::new(store.clone())).await;
        store.set_online(false);

        let session = open_viewer(&state, 3).await.expect("viewer opens");
        assert_eq!(session.live(), &LiveGameState::new(3));
        assert_eq!(state.channels().open_channels(), 1);
        drop(session);
        assert_eq!(state.channels().open_channels(), 0);
    }

    fn name(update: ViewerUpdate) -> String {
        update_event(4, &update)
            .and_then(|event| event.event)
            .expect("named event")
    }

    #[test]
    fn updates_map_to_named_events() {
        assert_eq!(name(ViewerUpdate::Score(LiveGameState::new(4))), "live_state");
        assert_eq!(name(ViewerUpdate::GameDeleted), "game_deleted");
        assert_eq!(
            name(ViewerUpdate::Overlay(OverlayDisplayState::default())),
            "overlay"
        );
        assert_eq!(name(ViewerUpdate::SpotlightExpired), "player_popup_cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn spotlight_event_reports_remaining_time() {
        let spotlight = PlayerSpotlight::show(
            PlayerRef {
                id: Some("p-7".into()),
                name: "Lee".into(),
                number: Some("7".into()),
                photo_url: None,
            },
            TeamSide::Home,
            Duration::from_secs(3),
        );
        let event = update_event(4, &ViewerUpdate::Spotlight(spotlight)).expect("event");
        assert_eq!(event.event.as_deref(), Some("player_popup"));
        let payload: serde_json::Value = serde_json::from_str(&event.data).expect("json");
        assert_eq!(payload["duration_ms"], 3000);
        assert_eq!(payload["side"], "home");
        assert_eq!(payload["player"]["name"], "Lee");
    }

    #[test]
    fn overlay_event_uses_kebab_case_positions() {
        let event = update_event(
            4,
            &ViewerUpdate::Overlay(OverlayDisplayState {
                position: OverlayPosition::BottomCenter,
                scale: 1.5,
            }),
        )
        .expect("event");
        let payload: serde_json::Value = serde_json::from_str(&event.data).expect("json");
        assert_eq!(payload["position"], "bottom-center");
        assert_eq!(payload["scale"], 1.5);
    }
}
