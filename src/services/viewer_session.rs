//! Read-only overlay session: follows score/metadata changes and ephemeral overlay
//! commands for one game.

use std::{future::pending, sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::score_store::ScoreStore,
    dto::{control::LiveStateDto, game::GameSummary, sse::ViewerSnapshot},
    state::{
        channels::{BroadcastChannels, ChangeFeed, ChannelReceiver, EphemeralEvent, RowChange},
        overlay::{OverlayDisplayState, PlayerSpotlight, ScaleBounds},
        scoreboard::{GameId, GameMetadata, LiveGameState},
    },
};

/// Presentation defaults applied to a new viewer.
#[derive(Debug, Clone, Copy)]
pub struct ViewerOptions {
    /// Overlay placement before any command arrives.
    pub overlay: OverlayDisplayState,
    /// Range incoming scales are clamped to.
    pub scale_bounds: ScaleBounds,
    /// How long a player popup stays on screen.
    pub spotlight_duration: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            overlay: OverlayDisplayState::default(),
            scale_bounds: ScaleBounds::DEFAULT,
            spotlight_duration: Duration::from_secs(3),
        }
    }
}

impl From<&AppConfig> for ViewerOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            overlay: config.overlay.initial,
            scale_bounds: config.overlay.scale_bounds,
            spotlight_duration: config.spotlight_duration,
        }
    }
}

/// Something a viewer must re-render.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerUpdate {
    /// New scoreboard state.
    Score(LiveGameState),
    /// Updated game metadata.
    GameInfo(GameMetadata),
    /// The game is gone; the session ends after this update.
    GameDeleted,
    /// Overlay moved or rescaled.
    Overlay(OverlayDisplayState),
    /// A player highlight started or replaced the previous one.
    Spotlight(PlayerSpotlight),
    /// The current highlight timed out.
    SpotlightExpired,
}

enum Step {
    Change(Result<RowChange, RecvError>),
    Event(Result<EphemeralEvent, RecvError>),
    SpotlightElapsed,
}

/// Projection of one game as rendered by an overlay.
pub struct ViewerSession {
    id: Uuid,
    game_id: GameId,
    store: Arc<dyn ScoreStore>,
    changes: Option<broadcast::Receiver<RowChange>>,
    events: Option<ChannelReceiver>,
    live: LiveGameState,
    metadata: Option<GameMetadata>,
    /// The store answered that the game does not exist.
    missing: bool,
    overlay: OverlayDisplayState,
    scale_bounds: ScaleBounds,
    spotlight: Option<PlayerSpotlight>,
    spotlight_duration: Duration,
}

impl ViewerSession {
    /// Subscribe to `game_id` and load its current state.
    ///
    /// Never fails: a fetch error leaves neutral defaults in place until the next change.
    pub async fn connect(
        store: Arc<dyn ScoreStore>,
        feed: &ChangeFeed,
        channels: &BroadcastChannels,
        game_id: GameId,
        options: ViewerOptions,
    ) -> Self {
        // Subscribe first so nothing committed during the initial fetch is missed.
        let changes = feed.subscribe();
        let events = channels.subscribe(game_id);
        let id = Uuid::new_v4();

        let live = match store.latest_score(game_id).await {
            Ok(Some(row)) => row.into(),
            Ok(None) => LiveGameState::new(game_id),
            Err(err) => {
                warn!(viewer = %id, game_id, error = %err, "failed to load score; showing defaults");
                LiveGameState::new(game_id)
            }
        };
        let (metadata, missing) = match store.find_game(game_id).await {
            Ok(Some(row)) => (Some(row.into()), false),
            Ok(None) => (None, true),
            Err(err) => {
                warn!(viewer = %id, game_id, error = %err, "failed to load game info");
                (None, false)
            }
        };

        info!(viewer = %id, game_id, "viewer session connected");
        Self {
            id,
            game_id,
            store,
            changes: Some(changes),
            events: Some(events),
            live,
            metadata,
            missing,
            overlay: options.overlay,
            scale_bounds: options.scale_bounds,
            spotlight: None,
            spotlight_duration: options.spotlight_duration,
        }
    }

    /// Identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Game this session follows.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Scoreboard as currently projected.
    pub fn live(&self) -> &LiveGameState {
        &self.live
    }

    /// Game metadata, absent until it could be loaded.
    pub fn metadata(&self) -> Option<&GameMetadata> {
        self.metadata.as_ref()
    }

    /// Whether the store reported the game as nonexistent at connect time.
    pub fn game_missing(&self) -> bool {
        self.missing
    }

    /// Overlay placement as last commanded.
    pub fn overlay(&self) -> OverlayDisplayState {
        self.overlay
    }

    /// Player highlight on screen, if any.
    pub fn spotlight(&self) -> Option<&PlayerSpotlight> {
        self.spotlight.as_ref()
    }

    /// Everything a freshly attached overlay must draw, evaluated against `now`.
    pub fn snapshot(&self, degraded: bool, now: OffsetDateTime) -> ViewerSnapshot {
        ViewerSnapshot {
            live: LiveStateDto::from(&self.live),
            game: self
                .metadata
                .as_ref()
                .map(|metadata| GameSummary::from_metadata(metadata, now)),
            overlay: self.overlay,
            degraded,
        }
    }

    /// Wait for the next change worth re-rendering.
    ///
    /// Returns `None` once the game was deleted or both subscriptions are closed.
    pub async fn next_update(&mut self) -> Option<ViewerUpdate> {
        loop {
            if self.changes.is_none() && self.events.is_none() && self.spotlight.is_none() {
                return None;
            }

            let expiry = self.spotlight.as_ref().map(|spotlight| spotlight.expires_at);
            let step = tokio::select! {
                change = recv_or_pending(&mut self.changes) => Step::Change(change),
                event = event_or_pending(&mut self.events) => Step::Event(event),
                _ = sleep_or_pending(expiry) => Step::SpotlightElapsed,
            };

            let update = match step {
                Step::Change(change) => self.on_change(change).await,
                Step::Event(event) => self.on_event(event),
                Step::SpotlightElapsed => {
                    self.spotlight = None;
                    Some(ViewerUpdate::SpotlightExpired)
                }
            };

            if update.is_some() {
                return update;
            }
        }
    }

    async fn on_change(&mut self, change: Result<RowChange, RecvError>) -> Option<ViewerUpdate> {
        match change {
            Ok(change) if change.game_id() != self.game_id => None,
            Ok(RowChange::Score(row)) => self.replace_live(row.into()),
            Ok(RowChange::GameInfo(row)) => {
                let metadata = GameMetadata::from(row);
                self.metadata = Some(metadata.clone());
                Some(ViewerUpdate::GameInfo(metadata))
            }
            Ok(RowChange::GameDeleted(_)) => {
                info!(viewer = %self.id, game_id = self.game_id, "game deleted; closing viewer");
                self.changes = None;
                self.events = None;
                self.spotlight = None;
                Some(ViewerUpdate::GameDeleted)
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(viewer = %self.id, skipped, "viewer lagged behind row changes; refetching");
                match self.store.latest_score(self.game_id).await {
                    Ok(Some(row)) => self.replace_live(row.into()),
                    Ok(None) => None,
                    Err(err) => {
                        warn!(viewer = %self.id, error = %err, "refetch after lag failed");
                        None
                    }
                }
            }
            Err(RecvError::Closed) => {
                self.changes = None;
                None
            }
        }
    }

    fn on_event(&mut self, event: Result<EphemeralEvent, RecvError>) -> Option<ViewerUpdate> {
        match event {
            Ok(EphemeralEvent::OverlayUpdate { position, scale }) => {
                self.overlay = OverlayDisplayState {
                    position,
                    scale: self.scale_bounds.clamp(scale, self.overlay.scale),
                };
                Some(ViewerUpdate::Overlay(self.overlay))
            }
            Ok(EphemeralEvent::PlayerPopup { player, side }) => {
                // A newer popup replaces the current one and restarts the timer.
                let spotlight = PlayerSpotlight::show(player, side, self.spotlight_duration);
                self.spotlight = Some(spotlight.clone());
                Some(ViewerUpdate::Spotlight(spotlight))
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(viewer = %self.id, skipped, "missed ephemeral events");
                None
            }
            Err(RecvError::Closed) => {
                self.events = None;
                None
            }
        }
    }

    fn replace_live(&mut self, next: LiveGameState) -> Option<ViewerUpdate> {
        if next.version < self.live.version {
            debug!(viewer = %self.id, version = next.version, "ignoring stale score row");
            return None;
        }
        if next.version == self.live.version && next.same_board(&self.live) {
            return None;
        }
        self.live = next;
        Some(ViewerUpdate::Score(self.live.clone()))
    }
}

async fn recv_or_pending<T: Clone>(
    receiver: &mut Option<broadcast::Receiver<T>>,
) -> Result<T, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn event_or_pending(
    receiver: &mut Option<ChannelReceiver>,
) -> Result<EphemeralEvent, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn sleep_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        dao::{
            models::{NewGameInfo, ScoreEntity},
            score_store::{ScoreStore, memory::MemoryScoreStore},
        },
        state::{
            overlay::{OverlayPosition, PlayerRef},
            scoreboard::TeamSide,
        },
    };

    async fn setup() -> (MemoryScoreStore, ChangeFeed, BroadcastChannels, GameId) {
        let feed = ChangeFeed::new(16);
        let store = MemoryScoreStore::new(feed.clone());
        let game = store
            .create_game(NewGameInfo {
                title: "Derby".into(),
                home_team: "Bears".into(),
                away_team: "Tigers".into(),
                home_bg_color: "#374151".into(),
                away_bg_color: "#f7f7f7".into(),
                home_logo_url: None,
                away_logo_url: None,
                font: None,
                field: Some("North park".into()),
                date_time: datetime!(2025-06-06 19:00 UTC),
                is_live: true,
                user_id: None,
            })
            .await
            .expect("create");
        (store, feed, BroadcastChannels::new(8), game.game_id)
    }

    fn popup(name: &str) -> EphemeralEvent {
        EphemeralEvent::PlayerPopup {
            player: PlayerRef {
                id: None,
                name: name.into(),
                number: None,
                photo_url: None,
            },
            side: TeamSide::Away,
        }
    }

    #[tokio::test]
    async fn missing_row_shows_defaults() {
        let (store, feed, channels, game_id) = setup().await;
        let viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;
        assert_eq!(viewer.live(), &LiveGameState::new(game_id));
        assert_eq!(
            viewer.metadata().map(|m| m.field.as_deref()),
            Some(Some("North park"))
        );
    }

    #[tokio::test]
    async fn snapshot_reports_defaults_and_status() {
        let (store, feed, channels, game_id) = setup().await;
        let viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        let snapshot = viewer.snapshot(false, datetime!(2025-06-06 20:00 UTC));
        assert_eq!(snapshot.live.inning, 1);
        assert_eq!(snapshot.overlay, OverlayDisplayState::default());
        let game = snapshot.game.expect("metadata loaded");
        assert_eq!(game.status, crate::state::scoreboard::GameStatus::Live);
        assert!(!snapshot.degraded);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_defaults() {
        let (store, feed, channels, game_id) = setup().await;
        store.set_online(false);
        let viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;
        assert_eq!(viewer.live(), &LiveGameState::new(game_id));
        assert!(viewer.metadata().is_none());
    }

    #[tokio::test]
    async fn score_changes_of_other_games_are_ignored() {
        let (store, feed, channels, game_id) = setup().await;
        let mut viewer = ViewerSession::connect(
            Arc::new(store.clone()),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        let mut other = LiveGameState::new(game_id + 100);
        other.h_score = 5;
        store
            .insert_score(ScoreEntity::from(&other))
            .await
            .expect("insert other");
        let mut mine = LiveGameState::new(game_id);
        mine.a_score = 1;
        store
            .insert_score(ScoreEntity::from(&mine))
            .await
            .expect("insert mine");

        match viewer.next_update().await {
            Some(ViewerUpdate::Score(state)) => assert_eq!((state.a_score, state.h_score), (1, 0)),
            other => panic!("unexpected update {other:?}"),
        }
    }

    fn versioned(game_id: GameId, version: u64, a_score: u32) -> RowChange {
        let mut state = LiveGameState::new(game_id);
        state.version = version;
        state.a_score = a_score;
        RowChange::Score(ScoreEntity::from(&state))
    }

    #[tokio::test]
    async fn older_rows_delivered_late_do_not_roll_back() {
        let (store, feed, channels, game_id) = setup().await;
        let mut viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        feed.publish(versioned(game_id, 2, 2));
        feed.publish(versioned(game_id, 1, 1));
        feed.publish(versioned(game_id, 3, 3));

        match viewer.next_update().await {
            Some(ViewerUpdate::Score(state)) => assert_eq!((state.version, state.a_score), (2, 2)),
            other => panic!("unexpected update {other:?}"),
        }
        // the v1 row is skipped; the next update is v3
        match viewer.next_update().await {
            Some(ViewerUpdate::Score(state)) => assert_eq!((state.version, state.a_score), (3, 3)),
            other => panic!("unexpected update {other:?}"),
        }
        assert_eq!(viewer.live().version, 3);
    }

    #[tokio::test]
    async fn unknown_game_is_flagged_missing() {
        let (store, feed, channels, game_id) = setup().await;
        let viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id + 50,
            ViewerOptions::default(),
        )
        .await;
        assert!(viewer.game_missing());
        drop(viewer);
        assert_eq!(channels.open_channels(), 0);
    }

    #[tokio::test]
    async fn overlay_updates_are_clamped_and_applied() {
        let (store, feed, channels, game_id) = setup().await;
        let mut viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        channels.send(
            game_id,
            EphemeralEvent::OverlayUpdate {
                position: OverlayPosition::BottomLeft,
                scale: 9.0,
            },
        );
        assert_eq!(
            viewer.next_update().await,
            Some(ViewerUpdate::Overlay(OverlayDisplayState {
                position: OverlayPosition::BottomLeft,
                scale: 3.0
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spotlight_clears_after_its_duration() {
        let (store, feed, channels, game_id) = setup().await;
        let mut viewer = ViewerSession::connect(
            Arc::new(store),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        let shown_at = Instant::now();
        channels.send(game_id, popup("Kim"));
        assert!(matches!(
            viewer.next_update().await,
            Some(ViewerUpdate::Spotlight(_))
        ));
        assert_eq!(viewer.next_update().await, Some(ViewerUpdate::SpotlightExpired));
        assert!(Instant::now() - shown_at >= Duration::from_secs(3));
        assert!(viewer.spotlight().is_none());
    }

    #[tokio::test]
    async fn game_deletion_ends_the_session() {
        let (store, feed, channels, game_id) = setup().await;
        let mut viewer = ViewerSession::connect(
            Arc::new(store.clone()),
            &feed,
            &channels,
            game_id,
            ViewerOptions::default(),
        )
        .await;

        store.delete_game(game_id).await.expect("delete");
        assert_eq!(viewer.next_update().await, Some(ViewerUpdate::GameDeleted));
        assert_eq!(viewer.next_update().await, None);
    }
}
