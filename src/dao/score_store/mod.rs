/// In-process backend.
pub mod memory;
/// PostgREST backend.
#[cfg(feature = "supabase-store")]
pub mod supabase;

use futures::future::BoxFuture;

use crate::dao::models::{GameInfoEntity, NewGameInfo, ScoreEntity};
use crate::dao::storage::StorageResult;
use crate::state::scoreboard::GameId;

/// Abstraction over the durable State Store holding game metadata and live scores.
///
/// Implementations publish a [`RowChange`](crate::state::channels::RowChange) for every
/// committed write so sessions can follow the store without polling.
pub trait ScoreStore: Send + Sync {
    fn create_game(&self, game: NewGameInfo) -> BoxFuture<'static, StorageResult<GameInfoEntity>>;
    fn find_game(&self, game_id: GameId)
    -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>>;
    /// All games, newest first.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameInfoEntity>>>;
    /// Full-row update; `None` when the game does not exist.
    fn update_game(
        &self,
        game: GameInfoEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>>;
    /// Remove a game and its score rows; `false` when nothing was deleted.
    fn delete_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>>;
    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>>;
    /// Most recently updated score row of a game.
    fn latest_score(&self, game_id: GameId)
    -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>>;
    /// Replace the latest score row if its version still equals `expected_version`.
    ///
    /// The stored row gets `expected_version + 1`. A version mismatch yields
    /// [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict).
    fn replace_score(
        &self,
        score: ScoreEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
