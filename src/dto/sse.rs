use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{control::LiveStateDto, game::GameSummary},
    state::{
        overlay::{OverlayDisplayState, PlayerRef},
        scoreboard::{GameId, TeamSide},
    },
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed events reach the default `message` handler.
    pub event: Option<String>,
    /// JSON-encoded payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event of every viewer stream.
pub struct ViewerSnapshot {
    /// Board at connect time.
    pub live: LiveStateDto,
    /// Absent when the metadata could not be loaded.
    pub game: Option<GameSummary>,
    /// Overlay placement the viewer starts with.
    pub overlay: OverlayDisplayState,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player highlight should be shown.
pub struct PlayerPopupEvent {
    /// Player to highlight.
    pub player: PlayerRef,
    /// Team of the player.
    pub side: TeamSide,
    /// How long the highlight stays on screen.
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the followed game disappears; the stream ends afterwards.
pub struct GameDeletedEvent {
    /// Game that was deleted.
    pub game_id: GameId,
}
