//! Polling change listener: rows written by other processes (another backend instance,
//! the Supabase dashboard, SQL scripts) are turned into [`RowChange`]s on the shared feed.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use time::OffsetDateTime;
use tokio::{
    sync::broadcast::error::RecvError,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    dao::models::{GameInfoEntity, ScoreEntity},
    state::{channels::RowChange, scoreboard::GameId},
};

use super::{SupabaseResult, SupabaseScoreStore};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLL_DELAY: Duration = Duration::from_secs(30);

/// Background task publishing changes the store did not make itself.
pub struct ChangeListener {
    store: SupabaseScoreStore,
    interval: Duration,
}

impl ChangeListener {
    /// Listen through `store`, publishing on the feed the store was built with.
    pub fn new(store: SupabaseScoreStore) -> Self {
        Self {
            store,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the delay between two polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll forever. Failures are logged and retried with a growing delay.
    pub async fn run(self) {
        let feed = self.store.feed().clone();
        let mut changes = feed.subscribe();
        let mut tracker = ChangeTracker::default();
        let mut delay = self.interval;
        let mut failures = 0u32;

        info!(interval_ms = self.interval.as_millis() as u64, "listening for storage changes");

        loop {
            // Writes published meanwhile (ours included) must not come back as new changes.
            let deadline = Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    change = changes.recv() => match change {
                        Ok(change) => {
                            tracker.observe(&change);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "change listener fell behind the feed");
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }

            match poll(&self.store, &mut tracker).await {
                Ok(found) => {
                    if failures > 0 {
                        info!(failures, "change polling recovered");
                    }
                    failures = 0;
                    delay = self.interval;
                    for change in found {
                        debug!(
                            table = change.table(),
                            game_id = change.game_id(),
                            "external row change"
                        );
                        feed.publish(change);
                    }
                }
                Err(err) => {
                    failures += 1;
                    delay = (delay * 2).min(MAX_POLL_DELAY);
                    warn!(
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "change polling failed"
                    );
                }
            }
        }
    }
}

async fn poll(
    store: &SupabaseScoreStore,
    tracker: &mut ChangeTracker,
) -> SupabaseResult<Vec<RowChange>> {
    if !tracker.primed {
        let games = store.all_games().await?;
        let newest = store.newest_score().await?;
        tracker.prime(games, newest);
        return Ok(Vec::new());
    }

    // Keys first: a game created after this read must not look deleted.
    let ids = store.game_ids().await?;
    let games = store
        .games_since(tracker.game_cursor.unwrap_or(OffsetDateTime::UNIX_EPOCH))
        .await?;
    let scores = store
        .scores_since(tracker.score_cursor.unwrap_or(OffsetDateTime::UNIX_EPOCH))
        .await?;

    let mut found = tracker.missing_games(&ids);
    found.extend(tracker.game_rows(games));
    found.extend(tracker.score_rows(scores));
    Ok(found)
}

type ScoreMark = (Option<OffsetDateTime>, u64);

/// What the listener already knows about each game, so only genuinely new rows are
/// published.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    primed: bool,
    scores: HashMap<GameId, ScoreMark>,
    games: HashMap<GameId, Option<OffsetDateTime>>,
    score_cursor: Option<OffsetDateTime>,
    game_cursor: Option<OffsetDateTime>,
}

impl ChangeTracker {
    /// Record the current contents without reporting anything.
    pub(crate) fn prime(&mut self, games: Vec<GameInfoEntity>, newest: Option<ScoreEntity>) {
        for game in games {
            self.advance_game_cursor(game.updated_at);
            self.games.insert(game.game_id, game.updated_at);
        }
        if let Some(row) = newest {
            self.advance_score_cursor(row.updated_at);
            self.scores.insert(row.game_id, (row.updated_at, row.version));
        }
        self.primed = true;
    }

    /// Remember a change; `true` when it was not known yet.
    pub(crate) fn observe(&mut self, change: &RowChange) -> bool {
        match change {
            RowChange::Score(row) => {
                let mark = (row.updated_at, row.version);
                let newer = self
                    .scores
                    .get(&row.game_id)
                    .is_none_or(|known| mark > *known);
                if newer {
                    self.scores.insert(row.game_id, mark);
                }
                newer
            }
            RowChange::GameInfo(game) => {
                let newer = match self.games.get(&game.game_id) {
                    Some(known) => game.updated_at > *known,
                    None => true,
                };
                if newer {
                    self.games.insert(game.game_id, game.updated_at);
                }
                newer
            }
            RowChange::GameDeleted(game_id) => {
                self.scores.remove(game_id);
                self.games.remove(game_id).is_some()
            }
        }
    }

    /// Deletions of known games absent from `ids`.
    pub(crate) fn missing_games(&mut self, ids: &[GameId]) -> Vec<RowChange> {
        let present: HashSet<GameId> = ids.iter().copied().collect();
        let mut gone: Vec<GameId> = self
            .games
            .keys()
            .filter(|game_id| !present.contains(game_id))
            .copied()
            .collect();
        gone.sort_unstable();
        gone.into_iter()
            .map(RowChange::GameDeleted)
            .filter(|change| self.observe(change))
            .collect()
    }

    /// Game rows not seen before, advancing the game cursor.
    pub(crate) fn game_rows(&mut self, rows: Vec<GameInfoEntity>) -> Vec<RowChange> {
        rows.into_iter()
            .filter_map(|row| {
                self.advance_game_cursor(row.updated_at);
                let change = RowChange::GameInfo(row);
                self.observe(&change).then_some(change)
            })
            .collect()
    }

    /// Score rows newer than what each game last showed, advancing the score cursor.
    pub(crate) fn score_rows(&mut self, rows: Vec<ScoreEntity>) -> Vec<RowChange> {
        rows.into_iter()
            .filter_map(|row| {
                self.advance_score_cursor(row.updated_at);
                let change = RowChange::Score(row);
                self.observe(&change).then_some(change)
            })
            .collect()
    }

    fn advance_score_cursor(&mut self, seen: Option<OffsetDateTime>) {
        self.score_cursor = self.score_cursor.max(seen);
    }

    fn advance_game_cursor(&mut self, seen: Option<OffsetDateTime>) {
        self.game_cursor = self.game_cursor.max(seen);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::{dao::models::NewGameInfo, state::scoreboard::LiveGameState};

    fn game(game_id: GameId, updated_at: OffsetDateTime) -> GameInfoEntity {
        let mut row = NewGameInfo {
            title: "Opening day".into(),
            home_team: "Bears".into(),
            away_team: "Tigers".into(),
            home_bg_color: "#374151".into(),
            away_bg_color: "#f7f7f7".into(),
            home_logo_url: None,
            away_logo_url: None,
            font: None,
            field: None,
            date_time: datetime!(2025-04-01 18:30 UTC),
            is_live: true,
            user_id: None,
        }
        .into_entity(game_id, datetime!(2025-04-01 12:00 UTC));
        row.updated_at = Some(updated_at);
        row
    }

    fn score(game_id: GameId, version: u64, updated_at: OffsetDateTime) -> ScoreEntity {
        let mut row = ScoreEntity::from(&LiveGameState::new(game_id));
        row.id = Some(Uuid::new_v4());
        row.version = version;
        row.a_score = version as u32;
        row.updated_at = Some(updated_at);
        row
    }

    fn primed() -> ChangeTracker {
        let mut tracker = ChangeTracker::default();
        tracker.prime(
            vec![
                game(1, datetime!(2025-04-01 12:00 UTC)),
                game(2, datetime!(2025-04-01 12:01 UTC)),
            ],
            Some(score(1, 3, datetime!(2025-04-01 12:05 UTC))),
        );
        tracker
    }

    #[test]
    fn priming_reports_nothing_and_sets_cursors() {
        let tracker = primed();
        assert!(tracker.primed);
        assert_eq!(tracker.game_cursor, Some(datetime!(2025-04-01 12:01 UTC)));
        assert_eq!(tracker.score_cursor, Some(datetime!(2025-04-01 12:05 UTC)));
    }

    #[test]
    fn only_newer_score_rows_are_reported() {
        let mut tracker = primed();
        let found = tracker.score_rows(vec![
            score(1, 3, datetime!(2025-04-01 12:05 UTC)),
            score(1, 4, datetime!(2025-04-01 12:06 UTC)),
            score(2, 0, datetime!(2025-04-01 12:07 UTC)),
        ]);

        let versions: Vec<_> = found
            .iter()
            .map(|change| match change {
                RowChange::Score(row) => (row.game_id, row.version),
                other => panic!("unexpected change {other:?}"),
            })
            .collect();
        assert_eq!(versions, vec![(1, 4), (2, 0)]);
        assert_eq!(tracker.score_cursor, Some(datetime!(2025-04-01 12:07 UTC)));

        // polling again from the cursor returns the last row once more
        assert!(
            tracker
                .score_rows(vec![score(2, 0, datetime!(2025-04-01 12:07 UTC))])
                .is_empty()
        );
    }

    #[test]
    fn writes_already_on_the_feed_are_not_republished() {
        let mut tracker = primed();
        let own = score(1, 4, datetime!(2025-04-01 12:06 UTC));
        assert!(tracker.observe(&RowChange::Score(own.clone())));

        assert!(tracker.score_rows(vec![own]).is_empty());
    }

    #[test]
    fn edited_games_are_reported_once() {
        let mut tracker = primed();
        let edited = game(2, datetime!(2025-04-01 13:00 UTC));

        let found = tracker.game_rows(vec![edited.clone()]);
        assert_eq!(found, vec![RowChange::GameInfo(edited.clone())]);
        assert!(tracker.game_rows(vec![edited]).is_empty());
        assert_eq!(tracker.game_cursor, Some(datetime!(2025-04-01 13:00 UTC)));
    }

    #[test]
    fn vanished_games_are_reported_deleted() {
        let mut tracker = primed();

        let found = tracker.missing_games(&[2]);
        assert_eq!(found, vec![RowChange::GameDeleted(1)]);
        assert!(!tracker.scores.contains_key(&1));
        assert!(tracker.missing_games(&[2]).is_empty());
    }
}
