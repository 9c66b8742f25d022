//! In-process store with the same contract as the managed backend, used for local runs
//! and tests.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

use futures::future::BoxFuture;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameInfoEntity, NewGameInfo, ScoreEntity},
        score_store::ScoreStore,
        storage::{StorageError, StorageResult},
    },
    state::{
        channels::{ChangeFeed, RowChange},
        scoreboard::GameId,
    },
};

/// Failures specific to the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Store keeping games and score rows in process memory. Clones share the same tables.
#[derive(Clone)]
pub struct MemoryScoreStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<Tables>,
    next_game_id: AtomicI64,
    online: AtomicBool,
    feed: ChangeFeed,
}

#[derive(Default)]
struct Tables {
    games: BTreeMap<GameId, GameInfoEntity>,
    scores: Vec<ScoreEntity>,
}

impl Tables {
    fn latest_score(&self, game_id: GameId) -> Option<&ScoreEntity> {
        self.scores
            .iter()
            .filter(|row| row.game_id == game_id)
            .max_by_key(|row| (row.updated_at, row.version))
    }

    fn latest_score_mut(&mut self, game_id: GameId) -> Option<&mut ScoreEntity> {
        self.scores
            .iter_mut()
            .filter(|row| row.game_id == game_id)
            .max_by_key(|row| (row.updated_at, row.version))
    }
}

impl MemoryScoreStore {
    /// Create an empty store publishing its writes on `feed`.
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(Tables::default()),
                next_game_id: AtomicI64::new(1),
                online: AtomicBool::new(true),
                feed,
            }),
        }
    }

    /// Simulate an outage: while offline every operation fails as unavailable.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) async fn score_rows(&self, game_id: GameId) -> usize {
        let tables = self.inner.tables.read().await;
        tables.scores.iter().filter(|row| row.game_id == game_id).count()
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.inner.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MemoryStoreError::Offline)
        }
    }
}

impl ScoreStore for MemoryScoreStore {
    fn create_game(&self, game: NewGameInfo) -> BoxFuture<'static, StorageResult<GameInfoEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let game_id = store.inner.next_game_id.fetch_add(1, Ordering::SeqCst);
            let entity = game.into_entity(game_id, OffsetDateTime::now_utc());
            {
                let mut tables = store.inner.tables.write().await;
                tables.games.insert(game_id, entity.clone());
            }
            store.inner.feed.publish(RowChange::GameInfo(entity.clone()));
            Ok(entity)
        })
    }

    fn find_game(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables.games.get(&game_id).cloned())
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let mut games: Vec<_> = tables.games.values().cloned().collect();
            games.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.game_id.cmp(&a.game_id))
            });
            Ok(games)
        })
    }

    fn update_game(
        &self,
        mut game: GameInfoEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let updated = {
                let mut tables = store.inner.tables.write().await;
                match tables.games.get_mut(&game.game_id) {
                    Some(existing) => {
                        game.created_at = existing.created_at;
                        game.updated_at = Some(OffsetDateTime::now_utc());
                        *existing = game.clone();
                        Some(game)
                    }
                    None => None,
                }
            };
            if let Some(row) = &updated {
                store.inner.feed.publish(RowChange::GameInfo(row.clone()));
            }
            Ok(updated)
        })
    }

    fn delete_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let removed = {
                let mut tables = store.inner.tables.write().await;
                tables.scores.retain(|row| row.game_id != game_id);
                tables.games.remove(&game_id).is_some()
            };
            if removed {
                store.inner.feed.publish(RowChange::GameDeleted(game_id));
            }
            Ok(removed)
        })
    }

    fn insert_score(&self, mut score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let now = OffsetDateTime::now_utc();
            score.id = Some(Uuid::new_v4());
            score.created_at = Some(now);
            score.updated_at = Some(now);
            {
                let mut tables = store.inner.tables.write().await;
                tables.scores.push(score.clone());
            }
            store.inner.feed.publish(RowChange::Score(score.clone()));
            Ok(score)
        })
    }

    fn latest_score(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables.latest_score(game_id).cloned())
        })
    }

    fn replace_score(
        &self,
        score: ScoreEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let game_id = score.game_id;
            let stored = {
                let mut tables = store.inner.tables.write().await;
                let Some(current) = tables.latest_score_mut(game_id) else {
                    return Err(StorageError::not_found(format!("score for game {game_id}")));
                };
                let other_row = score.id.is_some() && score.id != current.id;
                if other_row || current.version != expected_version {
                    return Err(StorageError::Conflict {
                        game_id,
                        expected: expected_version,
                        actual: Some(current.version),
                    });
                }

                let replacement = ScoreEntity {
                    id: current.id,
                    created_at: current.created_at,
                    version: expected_version + 1,
                    updated_at: Some(OffsetDateTime::now_utc()),
                    ..score
                };
                *current = replacement.clone();
                replacement
            };
            store.inner.feed.publish(RowChange::Score(stored.clone()));
            Ok(stored)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::scoreboard::LiveGameState;

    fn new_game(title: &str) -> NewGameInfo {
        NewGameInfo {
            title: title.into(),
            home_team: "Bears".into(),
            away_team: "Tigers".into(),
            home_bg_color: "#374151".into(),
            away_bg_color: "#f7f7f7".into(),
            home_logo_url: None,
            away_logo_url: None,
            font: None,
            field: None,
            date_time: datetime!(2025-04-01 18:30 UTC),
            is_live: false,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn replace_bumps_version_and_publishes() {
        let feed = ChangeFeed::new(8);
        let store = MemoryScoreStore::new(feed.clone());
        let game = store.create_game(new_game("A")).await.expect("create");
        let inserted = store
            .insert_score(ScoreEntity::from(&LiveGameState::new(game.game_id)))
            .await
            .expect("insert");
        assert_eq!(inserted.version, 0);

        let mut changes = feed.subscribe();
        let mut next = inserted.clone();
        next.a_score = 1;
        let stored = store.replace_score(next, 0).await.expect("replace");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.id, inserted.id);

        match changes.recv().await.expect("change") {
            RowChange::Score(row) => assert_eq!(row.a_score, 1),
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryScoreStore::new(ChangeFeed::new(8));
        let game = store.create_game(new_game("A")).await.expect("create");
        let row = store
            .insert_score(ScoreEntity::from(&LiveGameState::new(game.game_id)))
            .await
            .expect("insert");
        store.replace_score(row.clone(), 0).await.expect("first write");

        let err = store.replace_score(row, 0).await.expect_err("stale write");
        assert!(matches!(
            err,
            StorageError::Conflict {
                expected: 0,
                actual: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn replace_without_row_is_not_found() {
        let store = MemoryScoreStore::new(ChangeFeed::new(8));
        let err = store
            .replace_score(ScoreEntity::from(&LiveGameState::new(77)), 0)
            .await
            .expect_err("no row");
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryScoreStore::new(ChangeFeed::new(8));
        store.set_online(false);
        assert!(matches!(
            store.latest_score(1).await,
            Err(StorageError::Unavailable { .. })
        ));
        assert!(store.health_check().await.is_err());

        store.set_online(true);
        assert!(store.try_reconnect().await.is_ok());
    }

    #[tokio::test]
    async fn games_list_newest_first_and_delete_cascades() {
        let store = MemoryScoreStore::new(ChangeFeed::new(8));
        let first = store.create_game(new_game("first")).await.expect("create");
        let second = store.create_game(new_game("second")).await.expect("create");
        store
            .insert_score(ScoreEntity::from(&LiveGameState::new(first.game_id)))
            .await
            .expect("insert");

        let titles: Vec<_> = store
            .list_games()
            .await
            .expect("list")
            .into_iter()
            .map(|game| game.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);

        assert!(store.delete_game(first.game_id).await.expect("delete"));
        assert!(!store.delete_game(first.game_id).await.expect("delete again"));
        assert!(store.latest_score(first.game_id).await.expect("read").is_none());
        assert!(store.find_game(second.game_id).await.expect("read").is_some());
    }

    #[tokio::test]
    async fn replacing_a_superseded_row_is_a_conflict() {
        let store = MemoryScoreStore::new(ChangeFeed::new(8));
        let game = store.create_game(new_game("A")).await.expect("create");
        let first = store
            .insert_score(ScoreEntity::from(&LiveGameState::new(game.game_id)))
            .await
            .expect("insert");
        let newer = store
            .insert_score(ScoreEntity::from(&LiveGameState::new(game.game_id)))
            .await
            .expect("insert newer");

        let err = store
            .replace_score(first, 0)
            .await
            .expect_err("old row id");
        assert!(matches!(
            err,
            StorageError::Conflict {
                expected: 0,
                actual: Some(0),
                ..
            }
        ));
        let latest = store
            .latest_score(game.game_id)
            .await
            .expect("read")
            .expect("row");
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.version, 0);
    }
}
