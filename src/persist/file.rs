use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PersistedQueue, QueueStore, unix_now};
use crate::common::errors::{PlayerError, Result};
use crate::common::types::{ChannelId, GuildId};
use crate::protocol::tracks::Track;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    channel: u64,
    enqueued_at: u64,
    /// Tracks in wire-encoded form; the schema stays private to this store.
    tracks: Vec<String>,
}

/// Queue store backed by a single JSON snapshot file. Every mutation rewrites
/// the file; queues are small and mutations are already coalesced per
/// command, so this stays cheap.
pub struct JsonFileQueueStore {
    path: PathBuf,
    entries: Mutex<HashMap<u64, StoredEntry>>,
}

impl JsonFileQueueStore {
    /// Open the store, reading any existing snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| PlayerError::Store(e.to_string()))?;
            serde_json::from_str(&raw).map_err(|e| PlayerError::Store(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<u64, StoredEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PlayerError::Store(e.to_string()))?;
        }
        let raw =
            serde_json::to_string(entries).map_err(|e| PlayerError::Store(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| PlayerError::Store(e.to_string()))
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn put(&self, guild: GuildId, channel: ChannelId, tracks: &[Track]) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(
            guild.0,
            StoredEntry {
                channel: channel.0,
                enqueued_at: unix_now(),
                tracks: tracks.iter().map(|t| t.encode()).collect(),
            },
        );
        self.flush(&entries)
    }

    async fn drop_queue(&self, guild: GuildId) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(&guild.0).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PersistedQueue>> {
        let entries = self.entries.lock();
        let mut out = Vec::with_capacity(entries.len());
        for (guild, entry) in entries.iter() {
            let mut tracks = Vec::with_capacity(entry.tracks.len());
            for encoded in &entry.tracks {
                match Track::decode(encoded) {
                    Some(t) => tracks.push(t),
                    None => {
                        debug!("skipping undecodable persisted track for guild {guild}");
                    }
                }
            }
            out.push(PersistedQueue {
                guild: GuildId(*guild),
                channel: ChannelId(entry.channel),
                tracks,
                enqueued_at: entry.enqueued_at,
            });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
