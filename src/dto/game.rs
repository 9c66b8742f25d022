use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{GameInfoEntity, NewGameInfo, ScoreEntity},
    dto::{format_timestamp, validation::validate_hex_color},
    state::scoreboard::{GameId, GameMetadata, GameStatus, TextTone, contrast_tone},
};

const DEFAULT_HOME_BG: &str = "#374151";
const DEFAULT_AWAY_BG: &str = "#f7f7f7";

fn default_home_bg() -> String {
    DEFAULT_HOME_BG.into()
}

fn default_away_bg() -> String {
    DEFAULT_AWAY_BG.into()
}

/// Game metadata supplied when creating or replacing a game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GameInput {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 60))]
    pub home_team: String,
    #[validate(length(min = 1, max = 60))]
    pub away_team: String,
    /// Home panel background as `#rrggbb`; defaults to dark grey.
    #[serde(default = "default_home_bg")]
    #[validate(custom(function = "validate_hex_color"))]
    pub home_bg_color: String,
    /// Away panel background as `#rrggbb`; defaults to off-white.
    #[serde(default = "default_away_bg")]
    #[validate(custom(function = "validate_hex_color"))]
    pub away_bg_color: String,
    #[serde(default)]
    #[validate(url)]
    pub home_logo_url: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub away_logo_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 60))]
    pub font: Option<String>,
    /// Venue name.
    #[serde(default)]
    #[validate(length(max = 120))]
    pub field: Option<String>,
    /// Scheduled start (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub date_time: OffsetDateTime,
    #[serde(default)]
    pub is_live: bool,
}

impl GameInput {
    /// Insert payload owned by `user_id`.
    pub fn into_new_game(self, user_id: Option<String>) -> NewGameInfo {
        NewGameInfo {
            title: self.title.trim().to_string(),
            home_team: self.home_team.trim().to_string(),
            away_team: self.away_team.trim().to_string(),
            home_bg_color: self.home_bg_color.to_ascii_lowercase(),
            away_bg_color: self.away_bg_color.to_ascii_lowercase(),
            home_logo_url: self.home_logo_url,
            away_logo_url: self.away_logo_url,
            font: self.font,
            field: self.field,
            date_time: self.date_time,
            is_live: self.is_live,
            user_id,
        }
    }

    /// Full-row replacement of `existing`, keeping its key and owner.
    pub fn apply_to(self, existing: GameInfoEntity) -> GameInfoEntity {
        let owner = existing.user_id.clone();
        self.into_new_game(owner)
            .into_entity(existing.game_id, existing.created_at.unwrap_or(existing.date_time))
    }
}

/// Game metadata as returned to operators and overlays.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    pub game_id: GameId,
    pub title: String,
    pub home_team: String,
    pub away_team: String,
    pub home_bg_color: String,
    pub away_bg_color: String,
    /// Text tone readable on the home background.
    pub home_text_tone: TextTone,
    /// Text tone readable on the away background.
    pub away_text_tone: TextTone,
    pub home_logo_url: Option<String>,
    pub away_logo_url: Option<String>,
    pub font: Option<String>,
    pub field: Option<String>,
    pub date_time: String,
    pub is_live: bool,
    pub status: GameStatus,
}

impl GameSummary {
    /// Project metadata, deriving the status against `now`.
    pub fn from_metadata(metadata: &GameMetadata, now: OffsetDateTime) -> Self {
        Self {
            game_id: metadata.game_id,
            title: metadata.title.clone(),
            home_team: metadata.home_team.clone(),
            away_team: metadata.away_team.clone(),
            home_bg_color: metadata.home_bg_color.clone(),
            away_bg_color: metadata.away_bg_color.clone(),
            home_text_tone: contrast_tone(&metadata.home_bg_color),
            away_text_tone: contrast_tone(&metadata.away_bg_color),
            home_logo_url: metadata.home_logo_url.clone(),
            away_logo_url: metadata.away_logo_url.clone(),
            font: metadata.font.clone(),
            field: metadata.field.clone(),
            date_time: format_timestamp(metadata.date_time),
            is_live: metadata.is_live,
            status: metadata.status_at(now),
        }
    }
}

/// Compact score shown next to a game in listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreLine {
    /// Current inning.
    pub inning: u8,
    /// Top half in progress.
    pub is_top: bool,
    /// Away runs.
    pub a_score: u32,
    /// Home runs.
    pub h_score: u32,
}

impl From<&ScoreEntity> for ScoreLine {
    fn from(row: &ScoreEntity) -> Self {
        Self {
            inning: row.inning,
            is_top: row.is_top,
            a_score: row.a_score,
            h_score: row.h_score,
        }
    }
}

/// Listing entry: metadata plus the latest score when one exists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameListItem {
    /// Game metadata, flattened into the entry.
    #[serde(flatten)]
    pub game: GameSummary,
    /// Latest score, absent before the first row exists.
    pub score: Option<ScoreLine>,
    /// Creation time (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl GameListItem {
    /// Build the entry, deriving the status at `now`.
    pub fn new(entity: GameInfoEntity, score: Option<&ScoreEntity>, now: OffsetDateTime) -> Self {
        let created_at = entity.created_at.map(format_timestamp);
        let metadata = GameMetadata::from(entity);
        Self {
            game: GameSummary::from_metadata(&metadata, now),
            score: score.map(ScoreLine::from),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(json: &str) -> GameInput {
        serde_json::from_str(json).expect("valid json")
    }

    #[test]
    fn omitted_colours_use_defaults() {
        let game = input(
            r#"{"title":"Opener","home_team":"Bears","away_team":"Tigers",
                "date_time":"2025-04-01T18:30:00Z"}"#,
        );
        assert!(game.validate().is_ok());
        assert_eq!(game.home_bg_color, "#374151");
        assert_eq!(game.away_bg_color, "#f7f7f7");
        assert!(!game.is_live);
    }

    #[test]
    fn invalid_colour_and_empty_title_are_rejected() {
        let game = input(
            r#"{"title":"","home_team":"Bears","away_team":"Tigers",
                "home_bg_color":"blue","date_time":"2025-04-01T18:30:00Z"}"#,
        );
        let errors = game.validate().expect_err("invalid");
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("home_bg_color"));
    }

    #[test]
    fn replacement_keeps_key_and_owner() {
        let existing = input(
            r#"{"title":"Old","home_team":"A","away_team":"B","date_time":"2025-04-01T18:30:00Z"}"#,
        )
        .into_new_game(Some("user-1".into()))
        .into_entity(9, OffsetDateTime::UNIX_EPOCH);

        let updated = input(
            r#"{"title":" New ","home_team":"A","away_team":"B","is_live":true,
                "date_time":"2025-04-01T18:30:00Z"}"#,
        )
        .apply_to(existing);
        assert_eq!(updated.game_id, 9);
        assert_eq!(updated.title, "New");
        assert_eq!(updated.user_id.as_deref(), Some("user-1"));
        assert!(updated.is_live);
    }
}
