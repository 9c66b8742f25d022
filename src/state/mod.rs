/// Row-change feed and per-game ephemeral broadcast channels.
pub mod channels;
/// Pure score transitions.
pub mod engine;
/// Overlay placement and player spotlights.
pub mod overlay;
/// Live scoreboard snapshot and game metadata.
pub mod scoreboard;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OnceCell, RwLock, watch};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::score_store::ScoreStore,
    error::ServiceError,
    services::{auth_service::Authenticator, controller_session::ControllerSession},
};

use self::{
    channels::{BroadcastChannels, ChangeFeed},
    scoreboard::GameId,
};

/// Handle to the application state shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Controller session shared between concurrent operator requests for one game.
pub type SharedController = Arc<Mutex<ControllerSession>>;

type ControllerSlot = Arc<OnceCell<SharedController>>;

/// Central application state: storage handle, realtime hubs and live controller sessions.
pub struct AppState {
    store: RwLock<Option<Arc<dyn ScoreStore>>>,
    feed: ChangeFeed,
    channels: Arc<BroadcastChannels>,
    controllers: DashMap<GameId, ControllerSlot>,
    authenticator: Arc<dyn Authenticator>,
    config: Arc<AppConfig>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, authenticator: Arc<dyn Authenticator>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            feed: ChangeFeed::new(config.channel_capacity),
            channels: Arc::new(BroadcastChannels::new(config.channel_capacity)),
            controllers: DashMap::new(),
            authenticator,
            config: Arc::new(config),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ScoreStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_store(&self) -> Result<Arc<dyn ScoreStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn ScoreStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        // Sessions hold the previous handle; they are rebuilt against the new one.
        self.controllers.clear();
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            info!(degraded = value, "degraded mode changed");
        }
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Row-change feed every store publishes on.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Per-game ephemeral broadcast channels.
    pub fn channels(&self) -> &Arc<BroadcastChannels> {
        &self.channels
    }

    /// Settings loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Verifier for operator bearer tokens.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Controller session of a game, started on first use.
    ///
    /// Concurrent first calls for one game share a single start.
    pub async fn controller(&self, game_id: GameId) -> Result<SharedController, ServiceError> {
        let slot = self.controllers.entry(game_id).or_default().clone();
        let session = slot
            .get_or_try_init(|| async {
                let store = self.require_store().await?;
                let session = ControllerSession::start(
                    store,
                    &self.feed,
                    self.channels.clone(),
                    game_id,
                    self.config.overlay,
                )
                .await?;
                Ok::<_, ServiceError>(Arc::new(Mutex::new(session)))
            })
            .await;

        match session {
            Ok(session) => Ok(session.clone()),
            Err(err) => {
                // leave no empty slot behind for games that failed to start
                self.controllers
                    .remove_if(&game_id, |_, current| {
                        Arc::ptr_eq(current, &slot) && !current.initialized()
                    });
                Err(err)
            }
        }
    }

    /// Number of games with a live controller session.
    pub fn active_controllers(&self) -> usize {
        self.controllers
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Forget the controller session of a game, e.g. after it was deleted.
    pub fn drop_controller(&self, game_id: GameId) {
        self.controllers.remove(&game_id);
    }
}
