use async_trait::async_trait;
use dashmap::DashMap;

use super::{PersistedQueue, QueueStore, unix_now};
use crate::common::errors::Result;
use crate::common::types::{ChannelId, GuildId};
use crate::protocol::tracks::Track;

/// Volatile store. Useful for tests and for deployments that opt out of
/// queue persistence.
#[derive(Default)]
pub struct MemoryQueueStore {
    entries: DashMap<GuildId, PersistedQueue>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, guild: GuildId) -> bool {
        self.entries.contains_key(&guild)
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn put(&self, guild: GuildId, channel: ChannelId, tracks: &[Track]) -> Result<()> {
        self.entries.insert(
            guild,
            PersistedQueue {
                guild,
                channel,
                tracks: tracks.to_vec(),
                enqueued_at: unix_now(),
            },
        );
        Ok(())
    }

    async fn drop_queue(&self, guild: GuildId) -> Result<()> {
        self.entries.remove(&guild);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PersistedQueue>> {
        Ok(self.entries.iter().map(|e| e.value().clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
