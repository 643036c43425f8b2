use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{ChannelMember, VoiceGateway};
use crate::common::errors::{PlayerError, Result};
use crate::common::types::{ChannelId, GuildId, UserId};
use crate::protocol::tracks::Track;

/// Scriptable in-memory gateway for tests. Records every control call and
/// lets tests flip channel membership, guild visibility, and failure modes.
pub struct MockGateway {
    pub connected: DashMap<GuildId, ChannelId>,
    pub playing: DashMap<GuildId, Track>,
    pub paused: DashMap<GuildId, bool>,
    pub volumes: DashMap<GuildId, u16>,
    pub eq_pushes: DashMap<GuildId, [f32; 15]>,
    pub members: DashMap<GuildId, Vec<ChannelMember>>,
    /// Guilds reported as no longer visible to the bot.
    pub hidden_guilds: DashMap<GuildId, ()>,
    /// Guilds for which every control call fails fatally ("no such player").
    pub missing_players: DashMap<GuildId, ()>,
    pub calls: Mutex<Vec<String>>,
    track_end_tx: flume::Sender<GuildId>,
    track_end_rx: flume::Receiver<GuildId>,
}

impl MockGateway {
    pub fn new() -> Self {
        let (track_end_tx, track_end_rx) = flume::unbounded();
        Self {
            connected: DashMap::new(),
            playing: DashMap::new(),
            paused: DashMap::new(),
            volumes: DashMap::new(),
            eq_pushes: DashMap::new(),
            members: DashMap::new(),
            hidden_guilds: DashMap::new(),
            missing_players: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            track_end_tx,
            track_end_rx,
        }
    }

    fn check(&self, guild: GuildId) -> Result<()> {
        if self.missing_players.contains_key(&guild) {
            return Err(PlayerError::GatewayFatal(format!(
                "no such player for guild {guild}"
            )));
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn set_members(&self, guild: GuildId, members: Vec<(UserId, bool)>) {
        self.members.insert(
            guild,
            members
                .into_iter()
                .map(|(user, is_bot)| ChannelMember { user, is_bot })
                .collect(),
        );
    }

    pub fn hide_guild(&self, guild: GuildId) {
        self.hidden_guilds.insert(guild, ());
    }

    /// Signal a natural end of the guild's current track.
    pub fn end_current(&self, guild: GuildId) {
        self.playing.remove(&guild);
        let _ = self.track_end_tx.send(guild);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceGateway for MockGateway {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        self.record(format!("connect {guild} {channel}"));
        self.connected.insert(guild, channel);
        Ok(())
    }

    async fn disconnect(&self, guild: GuildId) -> Result<()> {
        self.record(format!("disconnect {guild}"));
        self.check(guild)?;
        self.connected.remove(&guild);
        self.playing.remove(&guild);
        Ok(())
    }

    async fn play(&self, guild: GuildId, track: &Track) -> Result<()> {
        self.record(format!("play {guild} {}", track.uri));
        self.check(guild)?;
        self.playing.insert(guild, track.clone());
        self.paused.insert(guild, false);
        Ok(())
    }

    async fn stop(&self, guild: GuildId) -> Result<()> {
        self.record(format!("stop {guild}"));
        self.check(guild)?;
        self.playing.remove(&guild);
        Ok(())
    }

    async fn pause(&self, guild: GuildId, paused: bool) -> Result<()> {
        self.record(format!("pause {guild} {paused}"));
        self.check(guild)?;
        self.paused.insert(guild, paused);
        Ok(())
    }

    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()> {
        self.record(format!("volume {guild} {volume}"));
        self.check(guild)?;
        self.volumes.insert(guild, volume);
        Ok(())
    }

    async fn set_eq(&self, guild: GuildId, bands: &[f32; 15]) -> Result<()> {
        self.record(format!("eq {guild}"));
        self.check(guild)?;
        self.eq_pushes.insert(guild, *bands);
        Ok(())
    }

    fn is_connected(&self, guild: GuildId) -> bool {
        self.connected.contains_key(&guild)
    }

    fn guild_visible(&self, guild: GuildId) -> bool {
        !self.hidden_guilds.contains_key(&guild)
    }

    fn channel_members(&self, guild: GuildId) -> Option<Vec<ChannelMember>> {
        self.members.get(&guild).map(|m| m.clone())
    }

    fn subscribe_track_end(&self) -> flume::Receiver<GuildId> {
        self.track_end_rx.clone()
    }
}
