//! Realtime plumbing: the row-change feed published by stores and the per-game ephemeral
//! broadcast channels used for overlay commands and player popups.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::debug;

use super::{
    overlay::{OverlayPosition, PlayerRef},
    scoreboard::{GameId, TeamSide},
};
use crate::dao::models::{GameInfoEntity, ScoreEntity};

/// A committed write, as seen by row-change subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    /// A `scores` row was inserted or replaced.
    Score(ScoreEntity),
    /// A `game_info` row was inserted or updated.
    GameInfo(GameInfoEntity),
    /// The game and its score rows were removed.
    GameDeleted(GameId),
}

impl RowChange {
    /// Game the change concerns, used by subscribers to filter.
    pub fn game_id(&self) -> GameId {
        match self {
            RowChange::Score(row) => row.game_id,
            RowChange::GameInfo(row) => row.game_id,
            RowChange::GameDeleted(game_id) => *game_id,
        }
    }

    /// Source table name.
    pub fn table(&self) -> &'static str {
        match self {
            RowChange::Score(_) => "scores",
            RowChange::GameInfo(_) | RowChange::GameDeleted(_) => "game_info",
        }
    }
}

/// Fan-out of committed row changes to every interested session.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl ChangeFeed {
    /// Create a feed whose subscribers may fall `capacity` messages behind before lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a subscriber for changes committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RowChange> {
        self.sender.subscribe()
    }

    /// Publish a change, ignoring the absence of subscribers.
    pub fn publish(&self, change: RowChange) {
        debug!(
            table = change.table(),
            game_id = change.game_id(),
            "publishing row change"
        );
        let _ = self.sender.send(change);
    }
}

/// Fire-and-forget message exchanged on a game's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum EphemeralEvent {
    /// Reposition or rescale every connected overlay.
    OverlayUpdate {
        /// Anchor corner or edge.
        position: OverlayPosition,
        /// Requested scale factor.
        scale: f32,
    },
    /// Show a player highlight for a short time.
    PlayerPopup {
        /// Player to highlight.
        player: PlayerRef,
        /// Team the player belongs to.
        side: TeamSide,
    },
}

type ChannelMap = DashMap<GameId, broadcast::Sender<EphemeralEvent>>;

/// Named per-game broadcast channels, created lazily on first use.
///
/// Messages are never retained: a receiver only observes what is sent after it subscribed.
/// A channel is dropped as soon as its last receiver goes away.
pub struct BroadcastChannels {
    capacity: usize,
    channels: Arc<ChannelMap>,
}

/// Membership of one game's broadcast channel.
///
/// Dropping the last membership of a game removes its channel.
pub struct ChannelReceiver {
    game_id: GameId,
    receiver: Option<broadcast::Receiver<EphemeralEvent>>,
    channels: Arc<ChannelMap>,
}

impl ChannelReceiver {
    /// Wait for the next event sent on the channel.
    pub async fn recv(&mut self) -> Result<EphemeralEvent, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }

    /// Take an already delivered event without waiting.
    pub fn try_recv(&mut self) -> Result<EphemeralEvent, TryRecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.try_recv(),
            None => Err(TryRecvError::Closed),
        }
    }
}

impl Drop for ChannelReceiver {
    fn drop(&mut self) {
        // release our slot first so the count below no longer includes it
        drop(self.receiver.take());
        let removed = self
            .channels
            .remove_if(&self.game_id, |_, sender| sender.receiver_count() == 0);
        if removed.is_some() {
            debug!(game_id = self.game_id, "last listener left; channel dropped");
        }
    }
}

impl BroadcastChannels {
    /// Create an empty registry whose channels buffer up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Public name of the channel for `game_id`.
    pub fn channel_name(game_id: GameId) -> String {
        format!("overlay-control-{game_id}")
    }

    /// Join the channel of `game_id`, creating it when nobody joined before.
    pub fn subscribe(&self, game_id: GameId) -> ChannelReceiver {
        let receiver = self
            .channels
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        ChannelReceiver {
            game_id,
            receiver: Some(receiver),
            channels: self.channels.clone(),
        }
    }

    /// Send `event` to the current members of the channel, returning how many received it.
    ///
    /// Sending to a channel nobody listens on is not an error; the message is dropped.
    pub fn send(&self, game_id: GameId, event: EphemeralEvent) -> usize {
        let Some(sender) = self.channels.get(&game_id).map(|entry| entry.clone()) else {
            debug!(
                channel = %Self::channel_name(game_id),
                "no listeners; dropping ephemeral event"
            );
            return 0;
        };

        sender.send(event).unwrap_or(0)
    }

    /// Drop the channel of a game; current receivers observe it as closed.
    pub fn remove(&self, game_id: GameId) {
        self.channels.remove(&game_id);
    }

    /// Number of receivers currently joined to a game's channel.
    pub fn listeners(&self, game_id: GameId) -> usize {
        self.channels
            .get(&game_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of games that currently have a channel.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }
}
