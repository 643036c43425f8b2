pub mod file;
pub mod memory;

pub use file::JsonFileQueueStore;
pub use memory::MemoryQueueStore;

use async_trait::async_trait;

use crate::common::errors::Result;
use crate::common::types::{ChannelId, GuildId};
use crate::protocol::tracks::Track;

/// One guild's surviving queue, as handed back by `load_all`.
#[derive(Debug, Clone)]
pub struct PersistedQueue {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub tracks: Vec<Track>,
    /// Unix seconds of the last enqueue, carried for display after restart.
    pub enqueued_at: u64,
}

/// Durable side-channel recording each guild's queue so a crash-restart can
/// rebuild it.
///
/// The store is authoritative only at startup; during runtime the in-memory
/// queue is authoritative and the store is a write-behind replica. `put`
/// replaces the whole entry, `drop_queue` must be idempotent.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn put(&self, guild: GuildId, channel: ChannelId, tracks: &[Track]) -> Result<()>;
    async fn drop_queue(&self, guild: GuildId) -> Result<()>;
    async fn load_all(&self) -> Result<Vec<PersistedQueue>>;
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
