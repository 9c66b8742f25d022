use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::scoreboard::GameId;

/// Row of the `scores` table holding one live scoreboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Row identifier, assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Game the snapshot belongs to.
    pub game_id: GameId,
    /// Inning, 1 to 9.
    pub inning: u8,
    /// Top half in progress.
    pub is_top: bool,
    /// Away runs.
    pub a_score: u32,
    /// Home runs.
    pub h_score: u32,
    /// Balls.
    pub b_count: u8,
    /// Strikes.
    pub s_count: u8,
    /// Outs.
    pub o_count: u8,
    /// Runner on first.
    pub is_first: bool,
    /// Runner on second.
    pub is_second: bool,
    /// Runner on third.
    pub is_third: bool,
    /// Optimistic-concurrency counter, bumped on every successful write.
    #[serde(default)]
    pub version: u64,
    /// Insert time, stamped by the store.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    /// Last write time, stamped by the store; the most recent row per game is authoritative.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

/// Row of the `game_info` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameInfoEntity {
    /// Primary key, assigned by the store on insert.
    pub game_id: GameId,
    pub title: String,
    pub home_team: String,
    pub away_team: String,
    pub home_bg_color: String,
    pub away_bg_color: String,
    #[serde(default)]
    pub home_logo_url: Option<String>,
    #[serde(default)]
    pub away_logo_url: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    /// Scheduled start.
    #[serde(with = "time::serde::rfc3339")]
    pub date_time: OffsetDateTime,
    #[serde(default)]
    pub is_live: bool,
    /// Owner account, when the game was created by an authenticated user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Insert time, stamped by the store.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    /// Last update time, stamped by the store.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

/// Insert payload for `game_info`; the store assigns the key and timestamps.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewGameInfo {
    pub title: String,
    pub home_team: String,
    pub away_team: String,
    pub home_bg_color: String,
    pub away_bg_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_time: OffsetDateTime,
    pub is_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl NewGameInfo {
    /// Materialise the row a store would hold after inserting this payload.
    pub fn into_entity(self, game_id: GameId, now: OffsetDateTime) -> GameInfoEntity {
        GameInfoEntity {
            game_id,
            title: self.title,
            home_team: self.home_team,
            away_team: self.away_team,
            home_bg_color: self.home_bg_color,
            away_bg_color: self.away_bg_color,
            home_logo_url: self.home_logo_url,
            away_logo_url: self.away_logo_url,
            font: self.font,
            field: self.field,
            date_time: self.date_time,
            is_live: self.is_live,
            user_id: self.user_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rows_parse_postgrest_payloads() {
        let json = r#"{
            "id": "0b8f2b5e-8d3c-4b7c-9a86-2f1d3f1d9a10",
            "game_id": 42,
            "inning": 3,
            "is_top": false,
            "a_score": 2,
            "h_score": 1,
            "b_count": 1,
            "s_count": 2,
            "o_count": 0,
            "is_first": true,
            "is_second": false,
            "is_third": false,
            "version": 5,
            "created_at": "2024-05-01T10:00:00.123456+00:00",
            "updated_at": "2024-05-01T10:05:00+00:00"
        }"#;
        let row: ScoreEntity = serde_json::from_str(json).expect("row parses");
        assert_eq!(row.game_id, 42);
        assert_eq!(row.version, 5);
        assert!(row.updated_at.is_some());
    }

    #[test]
    fn score_rows_without_version_default_to_zero() {
        let json = r#"{"game_id":1,"inning":1,"is_top":true,"a_score":0,"h_score":0,
            "b_count":0,"s_count":0,"o_count":0,"is_first":false,"is_second":false,"is_third":false}"#;
        let row: ScoreEntity = serde_json::from_str(json).expect("row parses");
        assert_eq!(row.version, 0);
        assert_eq!(row.id, None);
    }

    #[test]
    fn inserts_omit_store_assigned_columns() {
        let mut row: ScoreEntity = serde_json::from_str(
            r#"{"game_id":1,"inning":1,"is_top":true,"a_score":0,"h_score":0,
            "b_count":0,"s_count":0,"o_count":0,"is_first":false,"is_second":false,"is_third":false}"#,
        )
        .expect("row parses");
        row.version = 2;
        let value = serde_json::to_value(&row).expect("serialize");
        assert!(value.get("id").is_none());
        assert!(value.get("updated_at").is_none());
        assert_eq!(value["version"], 2);
    }
}
