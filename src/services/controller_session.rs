//! Operator-side session: applies intents through the engine, persists them with
//! optimistic concurrency and emits fire-and-forget overlay commands.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::OverlaySettings,
    dao::{
        models::ScoreEntity,
        score_store::ScoreStore,
        storage::StorageError,
    },
    error::ServiceError,
    state::{
        channels::{BroadcastChannels, ChangeFeed, EphemeralEvent, RowChange},
        engine::{self, ScoreIntent},
        overlay::{OverlayDisplayState, OverlayPosition, PlayerRef, ScaleBounds},
        scoreboard::{GameId, GameMetadata, LiveGameState, TeamSide},
    },
};

/// Live controller of a single game.
pub struct ControllerSession {
    game_id: GameId,
    store: Arc<dyn ScoreStore>,
    channels: Arc<BroadcastChannels>,
    changes: broadcast::Receiver<RowChange>,
    /// Last state the store acknowledged.
    confirmed: LiveGameState,
    confirmed_row: Option<Uuid>,
    /// What the operator sees; differs from `confirmed` only while a write is in flight.
    local: LiveGameState,
    metadata: GameMetadata,
    overlay: OverlayDisplayState,
    scale_bounds: ScaleBounds,
    deleted: bool,
}

impl ControllerSession {
    /// Load the current score and metadata of `game_id` and start following its changes.
    ///
    /// A game without a score row gets the neutral default row inserted.
    pub async fn start(
        store: Arc<dyn ScoreStore>,
        feed: &ChangeFeed,
        channels: Arc<BroadcastChannels>,
        game_id: GameId,
        overlay: OverlaySettings,
    ) -> Result<Self, ServiceError> {
        let changes = feed.subscribe();

        let metadata = store
            .find_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;

        let row = match store.latest_score(game_id).await? {
            Some(row) => row,
            None => {
                info!(game_id, "no score row yet; inserting defaults");
                store
                    .insert_score(ScoreEntity::from(&LiveGameState::new(game_id)))
                    .await?
            }
        };

        let confirmed_row = row.id;
        let confirmed = LiveGameState::from(row);
        info!(game_id, version = confirmed.version, "controller session started");

        Ok(Self {
            game_id,
            store,
            channels,
            changes,
            local: confirmed.clone(),
            confirmed,
            confirmed_row,
            metadata: metadata.into(),
            overlay: overlay.initial,
            scale_bounds: overlay.scale_bounds,
            deleted: false,
        })
    }

    /// Game this session controls.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// State currently shown to the operator.
    pub fn live(&self) -> &LiveGameState {
        &self.local
    }

    /// Last state acknowledged by the store.
    pub fn confirmed(&self) -> &LiveGameState {
        &self.confirmed
    }

    /// Game metadata as last loaded or notified.
    pub fn metadata(&self) -> &GameMetadata {
        &self.metadata
    }

    /// Last overlay command this controller sent.
    pub fn overlay(&self) -> OverlayDisplayState {
        self.overlay
    }

    /// Whether the game was deleted while this session was running.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Apply an operator intent and persist the result.
    ///
    /// A no-op intent returns the current state without writing. On a version conflict
    /// the session adopts the stored row and reports [`ServiceError::Conflict`]; on any
    /// other failure the local view reverts to the last confirmed state.
    pub async fn apply(&mut self, intent: ScoreIntent) -> Result<LiveGameState, ServiceError> {
        self.sync_pending().await?;

        let next = engine::apply(&self.local, &intent);
        if next.same_board(&self.local) {
            debug!(game_id = self.game_id, ?intent, "intent is a no-op; skipping write");
            return Ok(self.local.clone());
        }

        self.local = next.clone();

        let mut row = ScoreEntity::from(&next);
        row.id = self.confirmed_row;
        match self.store.replace_score(row, self.confirmed.version).await {
            Ok(stored) => {
                self.adopt(stored);
                debug!(
                    game_id = self.game_id,
                    version = self.confirmed.version,
                    ?intent,
                    "intent persisted"
                );
                Ok(self.local.clone())
            }
            Err(err @ StorageError::Conflict { .. }) => {
                warn!(game_id = self.game_id, error = %err, "score changed concurrently; resyncing");
                if let Err(resync_err) = self.resync().await {
                    warn!(game_id = self.game_id, error = %resync_err, "resync after conflict failed");
                    self.local = self.confirmed.clone();
                }
                Err(err.into())
            }
            Err(err) => {
                error!(game_id = self.game_id, error = %err, "failed to persist score; reverting");
                self.local = self.confirmed.clone();
                Err(err.into())
            }
        }
    }

    /// Drop local knowledge and reload the latest stored score.
    pub async fn resync(&mut self) -> Result<LiveGameState, ServiceError> {
        match self.store.latest_score(self.game_id).await? {
            Some(row) => {
                self.adopt(row);
                Ok(self.local.clone())
            }
            None => Err(ServiceError::NotFound(format!(
                "score for game {}",
                self.game_id
            ))),
        }
    }

    /// Reload the game metadata from the store.
    pub async fn refresh_metadata(&mut self) -> Result<&GameMetadata, ServiceError> {
        match self.store.find_game(self.game_id).await? {
            Some(row) => {
                self.metadata = row.into();
                Ok(&self.metadata)
            }
            None => {
                self.deleted = true;
                Err(ServiceError::NotFound(format!("game {}", self.game_id)))
            }
        }
    }

    /// Apply row changes that arrived since the last call.
    ///
    /// Rows older than the confirmed version are ignored. When notifications were missed
    /// the latest row is fetched instead.
    pub async fn sync_pending(&mut self) -> Result<(), ServiceError> {
        let mut missed = false;
        loop {
            match self.changes.try_recv() {
                Ok(change) if change.game_id() != self.game_id => continue,
                Ok(RowChange::Score(row)) => {
                    if row.version > self.confirmed.version {
                        debug!(game_id = self.game_id, version = row.version, "adopting external score change");
                        self.adopt(row);
                    }
                }
                Ok(RowChange::GameInfo(row)) => self.metadata = row.into(),
                Ok(RowChange::GameDeleted(_)) => self.deleted = true,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(game_id = self.game_id, skipped, "controller lagged behind row changes");
                    missed = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if self.deleted {
            return Err(ServiceError::NotFound(format!("game {}", self.game_id)));
        }
        if missed {
            self.resync().await?;
        }
        Ok(())
    }

    /// Broadcast an overlay reposition/rescale to every connected viewer.
    ///
    /// Returns how many viewers received it; nobody listening is not an error.
    pub fn send_overlay(
        &mut self,
        position: OverlayPosition,
        scale: f32,
    ) -> Result<usize, ServiceError> {
        if !self.scale_bounds.contains(scale) {
            return Err(ServiceError::InvalidInput(format!(
                "scale must be between {} and {}",
                self.scale_bounds.min, self.scale_bounds.max
            )));
        }

        self.overlay = OverlayDisplayState { position, scale };
        let delivered = self
            .channels
            .send(self.game_id, EphemeralEvent::OverlayUpdate { position, scale });
        debug!(game_id = self.game_id, ?position, scale, delivered, "overlay update sent");
        Ok(delivered)
    }

    /// Broadcast a player spotlight to every connected viewer.
    pub fn send_player_popup(
        &self,
        player: PlayerRef,
        side: TeamSide,
    ) -> Result<usize, ServiceError> {
        if player.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "player name must not be empty".into(),
            ));
        }

        let delivered = self
            .channels
            .send(self.game_id, EphemeralEvent::PlayerPopup { player, side });
        debug!(game_id = self.game_id, delivered, "player popup sent");
        Ok(delivered)
    }

    fn adopt(&mut self, row: ScoreEntity) {
        self.confirmed_row = row.id.or(self.confirmed_row);
        self.confirmed = LiveGameState::from(row);
        self.local = self.confirmed.clone();
    }
}
