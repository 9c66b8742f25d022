use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::format_timestamp,
    state::{
        overlay::{OverlayDisplayState, OverlayPosition, PlayerRef},
        scoreboard::{GameId, LiveGameState, TeamSide},
    },
};

/// Full live scoreboard as exposed over HTTP and SSE.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveStateDto {
    /// Game the board belongs to.
    pub game_id: GameId,
    /// Current inning, 1 to 9.
    pub inning: u8,
    /// `true` while the away team bats.
    pub is_top: bool,
    /// Away runs.
    pub a_score: u32,
    /// Home runs.
    pub h_score: u32,
    /// Balls in the current at-bat.
    pub b_count: u8,
    /// Strikes in the current at-bat.
    pub s_count: u8,
    /// Outs in the current half-inning.
    pub o_count: u8,
    /// Runner on first.
    pub is_first: bool,
    /// Runner on second.
    pub is_second: bool,
    /// Runner on third.
    pub is_third: bool,
    /// Write counter of the row; clients can drop payloads older than what they show.
    pub version: u64,
    /// Last write time (RFC 3339).
    pub updated_at: Option<String>,
}

impl From<&LiveGameState> for LiveStateDto {
    fn from(state: &LiveGameState) -> Self {
        Self {
            game_id: state.game_id,
            inning: state.inning,
            is_top: state.is_top,
            a_score: state.a_score,
            h_score: state.h_score,
            b_count: state.b_count,
            s_count: state.s_count,
            o_count: state.o_count,
            is_first: state.is_first,
            is_second: state.is_second,
            is_third: state.is_third,
            version: state.version,
            updated_at: state.updated_at.map(format_timestamp),
        }
    }
}

/// Controller view returned after every operator action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ControllerStateResponse {
    /// Board as the operator now sees it.
    pub live: LiveStateDto,
    /// Last overlay command sent by this server for the game.
    pub overlay: OverlayDisplayState,
}

/// Overlay reposition/rescale command.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OverlayUpdateRequest {
    /// Target anchor for every viewer.
    pub position: OverlayPosition,
    /// Scale factor, within the configured bounds (0.5 to 3.0 by default).
    pub scale: f32,
}

/// Player highlight command.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerPopupRequest {
    /// Roster identifier, if any.
    #[serde(default)]
    pub player_id: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    /// Jersey number as printed.
    #[serde(default)]
    #[validate(length(max = 4))]
    pub number: Option<String>,
    /// Headshot URL.
    #[serde(default)]
    #[validate(url)]
    pub photo_url: Option<String>,
    /// Team of the player.
    pub side: TeamSide,
}

impl PlayerPopupRequest {
    /// Split into the broadcast payload and its team.
    pub fn into_parts(self) -> (PlayerRef, TeamSide) {
        (
            PlayerRef {
                id: self.player_id,
                name: self.name.trim().to_string(),
                number: self.number,
                photo_url: self.photo_url,
            },
            self.side,
        )
    }
}

/// Outcome of a fire-and-forget broadcast.
#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResponse {
    /// Name of the per-game broadcast channel.
    pub channel: String,
    /// Viewers connected to this server that received the message.
    pub delivered: usize,
}
