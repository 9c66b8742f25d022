use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::dao::models::{GameInfoEntity, ScoreEntity};

/// Numeric identifier shared by `game_info`, `scores` and the per-game broadcast channel.
pub type GameId = i64;

/// First inning a game can be in.
pub const FIRST_INNING: u8 = 1;
/// Last inning the scoreboard tracks; extra innings are not modelled.
pub const LAST_INNING: u8 = 9;
/// Ball count wraps back to zero when it reaches this value.
pub const BALL_WRAP: u8 = 4;
/// Strike count wraps back to zero when it reaches this value.
pub const STRIKE_WRAP: u8 = 3;
/// Out count wraps back to zero when it reaches this value.
pub const OUT_WRAP: u8 = 3;

/// Which team a score change or spotlight refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    /// Visiting team, bats in the top half.
    Away,
    /// Home team, bats in the bottom half.
    Home,
}

/// Bases that can hold a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    /// First base.
    First,
    /// Second base.
    Second,
    /// Third base.
    Third,
}

/// Counters shown on the B/S/O display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// Ball count, 0..=3.
    Ball,
    /// Strike count, 0..=2.
    Strike,
    /// Out count, 0..=2.
    Out,
}

/// Live scoreboard snapshot for one game.
///
/// Every mutation produces a full replacement of this record; `version` is bumped by the
/// store on each successful write and is used as the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveGameState {
    /// Game this row belongs to.
    pub game_id: GameId,
    /// Current inning, 1..=9.
    pub inning: u8,
    /// True while the visiting team bats.
    pub is_top: bool,
    /// Visiting team runs.
    pub a_score: u32,
    /// Home team runs.
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
    /// Store-assigned write counter.
    pub version: u64,
    /// Store-assigned timestamp of the last write, absent until the row exists.
    pub updated_at: Option<OffsetDateTime>,
}

impl LiveGameState {
    /// Neutral state of a game nobody has touched yet: inning 1 top, 0-0, empty bases.
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            inning: FIRST_INNING,
            is_top: true,
            a_score: 0,
            h_score: 0,
            b_count: 0,
            s_count: 0,
            o_count: 0,
            is_first: false,
            is_second: false,
            is_third: false,
            version: 0,
            updated_at: None,
        }
    }

    /// Runs scored by the given side.
    pub fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Away => self.a_score,
            TeamSide::Home => self.h_score,
        }
    }

    /// Whether a runner occupies `base`.
    pub fn runner_on(&self, base: Base) -> bool {
        match base {
            Base::First => self.is_first,
            Base::Second => self.is_second,
            Base::Third => self.is_third,
        }
    }

    /// Compare the scoreboard fields only, ignoring store bookkeeping.
    pub fn same_board(&self, other: &Self) -> bool {
        self.game_id == other.game_id
            && self.inning == other.inning
            && self.is_top == other.is_top
            && self.a_score == other.a_score
            && self.h_score == other.h_score
            && self.b_count == other.b_count
            && self.s_count == other.s_count
            && self.o_count == other.o_count
            && self.is_first == other.is_first
            && self.is_second == other.is_second
            && self.is_third == other.is_third
    }
}

/// Game metadata read for display; never touched by the mutation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMetadata {
    /// Key of the game.
    pub game_id: GameId,
    /// Headline shown above the scoreboard.
    pub title: String,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// Home panel background, `#rrggbb`.
    pub home_bg_color: String,
    /// Away panel background, `#rrggbb`.
    pub away_bg_color: String,
    /// Home team logo.
    pub home_logo_url: Option<String>,
    /// Away team logo.
    pub away_logo_url: Option<String>,
    /// Font family requested for overlays.
    pub font: Option<String>,
    /// Venue name.
    pub field: Option<String>,
    /// Scheduled start.
    pub date_time: OffsetDateTime,
    /// Set by the operator while the game is being played.
    pub is_live: bool,
    /// Owning operator; games without one are shared.
    pub user_id: Option<String>,
}

/// Lifecycle of a game as shown in listings and overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Scheduled start is still in the future.
    Scheduled,
    /// Started and flagged live by an operator.
    Live,
    /// Started but no longer flagged live.
    Final,
}

impl GameMetadata {
    /// Derive the display status from the live flag and the scheduled start.
    ///
    /// The explicit flag wins once the start time has passed; before that the game is
    /// always reported as scheduled.
    pub fn status_at(&self, now: OffsetDateTime) -> GameStatus {
        if self.date_time > now {
            GameStatus::Scheduled
        } else if self.is_live {
            GameStatus::Live
        } else {
            GameStatus::Final
        }
    }

    /// Background colour used for a team's panel.
    pub fn background(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::Away => &self.away_bg_color,
            TeamSide::Home => &self.home_bg_color,
        }
    }
}

/// Text tone that stays readable on top of a given background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextTone {
    Dark,
    Light,
}

/// Pick a text tone for a `#rrggbb` background using the YIQ brightness formula.
///
/// Unparseable colours fall back to light text, matching a dark default panel.
pub fn contrast_tone(hex: &str) -> TextTone {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return TextTone::Light;
    }

    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };

    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => {
            let yiq = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
            if yiq >= 128 {
                TextTone::Dark
            } else {
                TextTone::Light
            }
        }
        _ => TextTone::Light,
    }
}

impl From<ScoreEntity> for LiveGameState {
    fn from(value: ScoreEntity) -> Self {
        Self {
            game_id: value.game_id,
            inning: value.inning,
            is_top: value.is_top,
            a_score: value.a_score,
            h_score: value.h_score,
            b_count: value.b_count,
            s_count: value.s_count,
            o_count: value.o_count,
            is_first: value.is_first,
            is_second: value.is_second,
            is_third: value.is_third,
            version: value.version,
            updated_at: value.updated_at,
        }
    }
}

impl From<&LiveGameState> for ScoreEntity {
    fn from(value: &LiveGameState) -> Self {
        Self {
            id: None,
            game_id: value.game_id,
            inning: value.inning,
            is_top: value.is_top,
            a_score: value.a_score,
            h_score: value.h_score,
            b_count: value.b_count,
            s_count: value.s_count,
            o_count: value.o_count,
            is_first: value.is_first,
            is_second: value.is_second,
            is_third: value.is_third,
            version: value.version,
            created_at: None,
            updated_at: value.updated_at,
        }
    }
}

impl From<GameInfoEntity> for GameMetadata {
    fn from(value: GameInfoEntity) -> Self {
        Self {
            game_id: value.game_id,
            title: value.title,
            home_team: value.home_team,
            away_team: value.away_team,
            home_bg_color: value.home_bg_color,
            away_bg_color: value.away_bg_color,
            home_logo_url: value.home_logo_url,
            away_logo_url: value.away_logo_url,
            font: value.font,
            field: value.field,
            date_time: value.date_time,
            is_live: value.is_live,
            user_id: value.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn metadata(date_time: OffsetDateTime, is_live: bool) -> GameMetadata {
        GameMetadata {
            game_id: 7,
            title: "Opening day".into(),
            home_team: "Bears".into(),
            away_team: "Tigers".into(),
            home_bg_color: "#374151".into(),
            away_bg_color: "#f7f7f7".into(),
            home_logo_url: None,
            away_logo_url: None,
            font: None,
            field: None,
            date_time,
            is_live,
            user_id: None,
        }
    }

    #[test]
    fn new_state_uses_neutral_defaults() {
        let state = LiveGameState::new(3);
        assert_eq!(state.inning, 1);
        assert!(state.is_top);
        assert_eq!((state.a_score, state.h_score), (0, 0));
        assert_eq!((state.b_count, state.s_count, state.o_count), (0, 0, 0));
        assert!(!state.is_first && !state.is_second && !state.is_third);
        assert_eq!(state.version, 0);
    }

    #[test]
    fn status_is_scheduled_before_start_even_when_flagged_live() {
        let now = OffsetDateTime::now_utc();
        let game = metadata(now + Duration::hours(2), true);
        assert_eq!(game.status_at(now), GameStatus::Scheduled);
    }

    #[test]
    fn status_follows_live_flag_after_start() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            metadata(now - Duration::minutes(5), true).status_at(now),
            GameStatus::Live
        );
        assert_eq!(
            metadata(now - Duration::minutes(5), false).status_at(now),
            GameStatus::Final
        );
    }

    #[test]
    fn contrast_tone_picks_readable_text() {
        assert_eq!(contrast_tone("#f7f7f7"), TextTone::Dark);
        assert_eq!(contrast_tone("374151"), TextTone::Light);
        assert_eq!(contrast_tone("#zzzzzz"), TextTone::Light);
        assert_eq!(contrast_tone(""), TextTone::Light);
    }

    #[test]
    fn entity_round_trip_keeps_version() {
        let mut state = LiveGameState::new(11);
        state.a_score = 4;
        state.version = 9;
        let entity = ScoreEntity::from(&state);
        assert_eq!(entity.id, None);
        assert_eq!(LiveGameState::from(entity), state);
    }
}
