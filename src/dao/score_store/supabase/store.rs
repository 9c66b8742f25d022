use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;
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

use super::{
    config::SupabaseConfig,
    error::{SupabaseDaoError, SupabaseResult},
};

const GAME_TABLE: &str = "game_info";
const SCORE_TABLE: &str = "scores";
const RETURN_REPRESENTATION: &str = "return=representation";

type Filters = Vec<(&'static str, String)>;

#[derive(Deserialize)]
struct GameKey {
    game_id: GameId,
}

fn filter_timestamp(time: OffsetDateTime) -> SupabaseResult<String> {
    time.format(&Rfc3339)
        .map_err(|source| SupabaseDaoError::FormatCursor { source })
}

/// PostgREST-backed store talking to a Supabase project over HTTPS.
///
/// Writes issued through this store are published on the shared [`ChangeFeed`] once the
/// backend confirms them.
#[derive(Clone)]
pub struct SupabaseScoreStore {
    client: Client,
    rest_url: Arc<str>,
    api_key: Arc<str>,
    schema: Option<Arc<str>>,
    feed: ChangeFeed,
}

impl SupabaseScoreStore {
    /// Build the HTTP client and check that the REST endpoint answers.
    pub async fn connect(config: SupabaseConfig, feed: ChangeFeed) -> SupabaseResult<Self> {
        let store = Self::new(config, feed)?;
        store.ping().await?;
        Ok(store)
    }

    /// Build the HTTP client without contacting the backend.
    pub fn new(config: SupabaseConfig, feed: ChangeFeed) -> SupabaseResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| SupabaseDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            rest_url: Arc::from(format!("{}/rest/v1", config.trimmed_url())),
            api_key: Arc::from(config.api_key),
            schema: config.schema.map(Arc::from),
            feed,
        })
    }

    /// Feed this store publishes its confirmed writes on.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Most recently written score row across every game.
    pub(crate) async fn newest_score(&self) -> SupabaseResult<Option<ScoreEntity>> {
        let rows = self
            .select::<ScoreEntity>(
                SCORE_TABLE,
                vec![
                    ("order", "updated_at.desc,version.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Score rows written at or after `cursor`, oldest first.
    pub(crate) async fn scores_since(
        &self,
        cursor: OffsetDateTime,
    ) -> SupabaseResult<Vec<ScoreEntity>> {
        self.select(
            SCORE_TABLE,
            vec![
                ("updated_at", format!("gte.{}", filter_timestamp(cursor)?)),
                ("order", "updated_at.asc,version.asc".to_string()),
            ],
        )
        .await
    }

    /// Every game row, used to seed change tracking.
    pub(crate) async fn all_games(&self) -> SupabaseResult<Vec<GameInfoEntity>> {
        self.select(GAME_TABLE, vec![("order", "updated_at.asc".to_string())])
            .await
    }

    /// Game rows written at or after `cursor`, oldest first.
    pub(crate) async fn games_since(
        &self,
        cursor: OffsetDateTime,
    ) -> SupabaseResult<Vec<GameInfoEntity>> {
        self.select(
            GAME_TABLE,
            vec![
                ("updated_at", format!("gte.{}", filter_timestamp(cursor)?)),
                ("order", "updated_at.asc".to_string()),
            ],
        )
        .await
    }

    /// Keys of every existing game.
    pub(crate) async fn game_ids(&self) -> SupabaseResult<Vec<GameId>> {
        let builder = self
            .request(Method::GET, GAME_TABLE)
            .query(&[("select", "game_id")]);
        let rows = self.rows::<GameKey>(builder, GAME_TABLE).await?;
        Ok(rows.into_iter().map(|row| row.game_id).collect())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.rest_url, table);
        let profile_header = if method == Method::GET {
            "Accept-Profile"
        } else {
            "Content-Profile"
        };
        let builder = self
            .client
            .request(method, url)
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref());
        match self.schema {
            Some(ref schema) => builder.header(profile_header, schema.as_ref()),
            None => builder,
        }
    }

    async fn rows<T>(&self, builder: RequestBuilder, table: &str) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|source| SupabaseDaoError::RequestSend {
                path: table.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(SupabaseDaoError::RequestStatus {
                path: table.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|source| SupabaseDaoError::DecodeResponse {
                path: table.to_string(),
                source,
            })
    }

    async fn select<T>(&self, table: &str, query: Filters) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let builder = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .query(&query);
        self.rows(builder, table).await
    }

    async fn insert<T, B>(&self, table: &str, body: &B) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
        B: ?Sized + Serialize,
    {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        self.rows(builder, table)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseDaoError::EmptyRepresentation {
                path: table.to_string(),
            })
    }

    async fn patch<T, B>(&self, table: &str, filters: Filters, body: &B) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
        B: ?Sized + Serialize,
    {
        let builder = self
            .request(Method::PATCH, table)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&filters)
            .json(body);
        self.rows(builder, table).await
    }

    async fn delete<T>(&self, table: &str, filters: Filters) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let builder = self
            .request(Method::DELETE, table)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&filters);
        self.rows(builder, table).await
    }

    async fn latest_score_row(&self, game_id: GameId) -> SupabaseResult<Option<ScoreEntity>> {
        let rows = self
            .select::<ScoreEntity>(
                SCORE_TABLE,
                vec![
                    ("game_id", format!("eq.{game_id}")),
                    ("order", "updated_at.desc,version.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn ping(&self) -> SupabaseResult<()> {
        let builder = self
            .request(Method::GET, GAME_TABLE)
            .query(&[("select", "game_id"), ("limit", "1")]);
        self.rows::<serde_json::Value>(builder, GAME_TABLE)
            .await
            .map(|_| ())
    }
}

/// Row a conditional score update may target: the latest row of the game, provided the
/// caller still holds that row at `expected_version`.
fn replace_target(
    game_id: GameId,
    latest: Option<&ScoreEntity>,
    requested: Option<Uuid>,
    expected_version: u64,
) -> StorageResult<Uuid> {
    let Some(latest) = latest else {
        return Err(StorageError::not_found(format!("score for game {game_id}")));
    };
    let Some(latest_id) = latest.id else {
        return Err(StorageError::not_found(format!("score id for game {game_id}")));
    };
    let other_row = requested.is_some_and(|id| id != latest_id);
    if other_row || latest.version != expected_version {
        return Err(StorageError::Conflict {
            game_id,
            expected: expected_version,
            actual: Some(latest.version),
        });
    }
    Ok(latest_id)
}

impl ScoreStore for SupabaseScoreStore {
    fn create_game(&self, game: NewGameInfo) -> BoxFuture<'static, StorageResult<GameInfoEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let created: GameInfoEntity = store.insert(GAME_TABLE, &game).await?;
            store.feed.publish(RowChange::GameInfo(created.clone()));
            Ok(created)
        })
    }

    fn find_game(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select::<GameInfoEntity>(GAME_TABLE, vec![("game_id", format!("eq.{game_id}"))])
                .await?;
            Ok(rows.into_iter().next())
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .select(GAME_TABLE, vec![("order", "created_at.desc".to_string())])
                .await
                .map_err(Into::into)
        })
    }

    fn update_game(
        &self,
        mut game: GameInfoEntity,
    ) -> BoxFuture<'static, StorageResult<Option<GameInfoEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let game_id = game.game_id;
            game.created_at = None;
            game.updated_at = None;
            let rows = store
                .patch::<GameInfoEntity, _>(
                    GAME_TABLE,
                    vec![("game_id", format!("eq.{game_id}"))],
                    &game,
                )
                .await?;
            let updated = rows.into_iter().next();
            if let Some(row) = &updated {
                store.feed.publish(RowChange::GameInfo(row.clone()));
            }
            Ok(updated)
        })
    }

    fn delete_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = || vec![("game_id", format!("eq.{game_id}"))];
            store
                .delete::<serde_json::Value>(SCORE_TABLE, filter())
                .await?;
            let removed = store
                .delete::<serde_json::Value>(GAME_TABLE, filter())
                .await?;
            if removed.is_empty() {
                return Ok(false);
            }
            store.feed.publish(RowChange::GameDeleted(game_id));
            Ok(true)
        })
    }

    fn insert_score(&self, mut score: ScoreEntity) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            score.id = None;
            score.created_at = None;
            score.updated_at = None;
            let created: ScoreEntity = store.insert(SCORE_TABLE, &score).await?;
            store.feed.publish(RowChange::Score(created.clone()));
            Ok(created)
        })
    }

    fn latest_score(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_score_row(game_id).await.map_err(Into::into) })
    }

    fn replace_score(
        &self,
        score: ScoreEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<ScoreEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let game_id = score.game_id;
            let latest = store.latest_score_row(game_id).await?;
            let row_id = replace_target(game_id, latest.as_ref(), score.id, expected_version)?;

            let body = ScoreEntity {
                id: None,
                created_at: None,
                version: expected_version + 1,
                updated_at: None,
                ..score
            };
            let rows = store
                .patch::<ScoreEntity, _>(
                    SCORE_TABLE,
                    vec![
                        ("id", format!("eq.{row_id}")),
                        ("version", format!("eq.{expected_version}")),
                    ],
                    &body,
                )
                .await?;

            match rows.into_iter().next() {
                Some(stored) => {
                    store.feed.publish(RowChange::Score(stored.clone()));
                    Ok(stored)
                }
                None => {
                    // The filter matched nothing: either the row moved on or it is gone.
                    let current = store.latest_score_row(game_id).await?;
                    debug!(
                        game_id,
                        expected_version,
                        actual = ?current.as_ref().map(|row| row.version),
                        "conditional score update matched no row"
                    );
                    match current {
                        Some(row) => Err(StorageError::Conflict {
                            game_id,
                            expected: expected_version,
                            actual: Some(row.version),
                        }),
                        None => Err(StorageError::not_found(format!("score for game {game_id}"))),
                    }
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // HTTP is stateless: reconnecting means the endpoint answers again.
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::scoreboard::LiveGameState;

    fn row(version: u64) -> ScoreEntity {
        let mut row = ScoreEntity::from(&LiveGameState::new(9));
        row.id = Some(Uuid::new_v4());
        row.version = version;
        row
    }

    #[test]
    fn update_targets_the_latest_row_at_the_expected_version() {
        let latest = row(3);
        let target = replace_target(9, Some(&latest), latest.id, 3).expect("target");
        assert_eq!(Some(target), latest.id);
        assert_eq!(replace_target(9, Some(&latest), None, 3).ok(), latest.id);
    }

    #[test]
    fn superseded_row_is_a_conflict_even_at_the_same_version() {
        let latest = row(0);
        let err = replace_target(9, Some(&latest), Some(Uuid::new_v4()), 0).expect_err("old row");
        assert!(matches!(
            err,
            StorageError::Conflict {
                expected: 0,
                actual: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn stale_version_and_missing_row_are_told_apart() {
        let latest = row(4);
        assert!(matches!(
            replace_target(9, Some(&latest), latest.id, 2),
            Err(StorageError::Conflict {
                actual: Some(4),
                ..
            })
        ));
        assert!(matches!(
            replace_target(9, None, None, 0),
            Err(StorageError::NotFound { .. })
        ));
    }
}
