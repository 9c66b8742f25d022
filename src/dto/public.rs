use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{control::LiveStateDto, game::GameSummary};

/// Read-only projection of a game for unauthenticated overlays.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicGameResponse {
    /// Display metadata.
    pub game: GameSummary,
    /// Latest board, or defaults when no score exists yet.
    pub live: LiveStateDto,
}
