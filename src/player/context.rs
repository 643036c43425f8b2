use std::time::Instant;

use crate::common::types::{ChannelId, GuildId};
use crate::player::equalizer::Equalizer;
use crate::protocol::tracks::Track;
use crate::queue::TrackQueue;

/// Lifecycle state of a session. `current` is populated exactly while the
/// status is Playing or Paused (and transiently during Connecting promotion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Connecting,
    Playing,
    Paused,
    Idle,
    Disconnecting,
    Closed,
}

impl PlayerStatus {
    /// Sessions in these states reject play/skip with `SessionClosing`.
    pub fn is_draining(&self) -> bool {
        matches!(self, Self::Disconnecting | Self::Closed)
    }
}

/// Per-guild player state. One exists per guild at most; every mutation goes
/// through the owning handle's mutex.
pub struct Player {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub queue: TrackQueue,
    pub current: Option<Track>,
    pub paused: bool,
    pub volume: u16,
    pub eq: Equalizer,
    pub status: PlayerStatus,
    pub connected_at: Instant,
    pub last_active_at: Instant,
    pub autoplay_notified: bool,
}

impl Player {
    pub fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        let now = Instant::now();
        Self {
            guild_id,
            channel_id,
            queue: TrackQueue::new(),
            current: None,
            paused: false,
            volume: 100,
            eq: Equalizer::new(),
            status: PlayerStatus::Connecting,
            connected_at: now,
            last_active_at: now,
            autoplay_notified: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Instant::now();
    }
}
