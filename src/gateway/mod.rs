#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::common::errors::Result;
use crate::common::types::{ChannelId, GuildId, UserId};
use crate::protocol::tracks::Track;

/// A member visible in a session's voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMember {
    pub user: UserId,
    pub is_bot: bool,
}

/// The remote service that actually streams audio, behind a capability
/// interface. The core never sees the wire protocol; implementations adapt
/// whatever client library the bot uses.
///
/// Control calls report `GatewayUnavailable` for transient failures and
/// `GatewayFatal` when the gateway has no player for the guild.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<()>;
    async fn disconnect(&self, guild: GuildId) -> Result<()>;
    async fn play(&self, guild: GuildId, track: &Track) -> Result<()>;
    async fn stop(&self, guild: GuildId) -> Result<()>;
    async fn pause(&self, guild: GuildId, paused: bool) -> Result<()>;
    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()>;
    async fn set_eq(&self, guild: GuildId, bands: &[f32; 15]) -> Result<()>;

    fn is_connected(&self, guild: GuildId) -> bool;

    /// Whether the guild is still visible to the bot at all. Sessions in
    /// invisible guilds are orphaned and get purged.
    fn guild_visible(&self, guild: GuildId) -> bool;

    /// Current voice channel membership, or `None` when not connected.
    fn channel_members(&self, guild: GuildId) -> Option<Vec<ChannelMember>>;

    /// Stream of guilds whose current track just ended. The registry drains
    /// this into queue advancement.
    fn subscribe_track_end(&self) -> flume::Receiver<GuildId>;
}
