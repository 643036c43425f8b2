use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::common::errors::{PlayerError, Result};
use crate::common::types::{ChannelId, GuildId};
use crate::configs::PlayerConfig;
use crate::gateway::VoiceGateway;
use crate::persist::QueueStore;
use crate::player::commands::PlayerHandle;
use crate::player::context::{Player, PlayerStatus};
use crate::policy::PolicyStore;

/// Explicit registry of live sessions, one per guild. Constructed at startup
/// and passed to the supervisor and the dispatcher; replaces the original's
/// module-global player table.
pub struct PlayerRegistry {
    players: DashMap<GuildId, PlayerHandle>,
    gateway: Arc<dyn VoiceGateway>,
    store: Arc<dyn QueueStore>,
    policies: Arc<dyn PolicyStore>,
    config: PlayerConfig,
}

impl PlayerRegistry {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        store: Arc<dyn QueueStore>,
        policies: Arc<dyn PolicyStore>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            players: DashMap::new(),
            gateway,
            store,
            policies,
            config,
        }
    }

    pub fn gateway(&self) -> Arc<dyn VoiceGateway> {
        self.gateway.clone()
    }

    pub fn get(&self, guild: GuildId) -> Option<PlayerHandle> {
        self.players.get(&guild).map(|h| h.clone())
    }

    /// Fetch the guild's session, connecting a fresh one when none exists.
    /// A session rebuilt by `restore` has no gateway connection yet; it is
    /// connected here, to its own channel, before the handle is returned.
    /// Connects run under the configured connect timeout; on success the
    /// session lands in Idle.
    pub async fn get_or_create(&self, guild: GuildId, channel: ChannelId) -> Result<PlayerHandle> {
        if let Some(handle) = self.get(guild) {
            if handle.status().await != PlayerStatus::Closed {
                if !self.gateway.is_connected(guild) {
                    self.connect(guild, handle.channel_id().await).await?;
                }
                return Ok(handle);
            }
            // A closed leftover; replace it.
            self.players.remove(&guild);
        }

        self.connect(guild, channel).await?;

        let mut player = Player::new(guild, channel);
        player.status = PlayerStatus::Idle;
        let handle = self.make_handle(player);
        self.players.insert(guild, handle.clone());
        info!("voice session created for guild {guild} in channel {channel}");
        Ok(handle)
    }

    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        let connect = self.gateway.connect(guild, channel);
        match tokio::time::timeout(Duration::from_millis(self.config.connect_timeout_ms), connect)
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PlayerError::GatewayUnavailable(
                "voice connect timed out".into(),
            )),
        }
    }

    pub fn remove(&self, guild: GuildId) -> Option<PlayerHandle> {
        self.players.remove(&guild).map(|(_, h)| h)
    }

    /// Snapshot of all live handles, for the supervisor's per-tick scan.
    pub fn all(&self) -> Vec<PlayerHandle> {
        self.players.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Rebuild sessions from the persistent queue store after a restart.
    /// Restored sessions are idle and unconnected; playback resumes on the
    /// next play command. The store is authoritative here and only here.
    pub async fn restore(&self) -> Result<usize> {
        let persisted = self.store.load_all().await?;
        let mut restored = 0;

        for entry in persisted {
            if self.players.contains_key(&entry.guild) {
                continue;
            }
            let mut player = Player::new(entry.guild, entry.channel);
            player.status = PlayerStatus::Idle;
            player.queue.extend(entry.tracks);
            let _ = player.queue.take_dirty();

            let guild = entry.guild;
            let queued = player.queue.len();
            self.players.insert(guild, self.make_handle(player));
            restored += 1;
            info!("restored queue of {queued} tracks for guild {guild}");
        }
        Ok(restored)
    }

    /// Drain the gateway's track-end stream into queue advancement. Runs
    /// until the gateway drops its sender.
    pub async fn drive_track_events(&self) {
        let rx = self.gateway.subscribe_track_end();
        while let Ok(guild) = rx.recv_async().await {
            let Some(handle) = self.get(guild) else {
                debug!("track end for unknown guild {guild}");
                continue;
            };
            if let Err(err) = handle.handle_track_end().await {
                debug!("track-end advancement failed for {guild}: {err}");
            }
        }
    }

    /// Disconnect every session. Used at shutdown.
    pub async fn drain(&self) {
        for handle in self.all() {
            if let Err(err) = handle.disconnect().await {
                debug!("disconnect failed for {}: {err}", handle.guild_id());
            }
            self.players.remove(&handle.guild_id());
        }
    }

    fn make_handle(&self, player: Player) -> PlayerHandle {
        PlayerHandle::new(
            player,
            self.gateway.clone(),
            self.store.clone(),
            self.policies.clone(),
            self.config.clone(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
