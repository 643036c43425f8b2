use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::protocol::tracks::Track;

/// Repeat behaviour on track end. Orthogonal to shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// Ordered queue of pending tracks for one session.
///
/// Insertion order is semantically significant: append and pop-front are
/// O(1), removal by index is O(n). Mutations mark the queue dirty so the
/// owning session can flush a single write-behind update to the persistent
/// store per command.
pub struct TrackQueue {
    items: VecDeque<Track>,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    rng: StdRng,
    dirty: bool,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded constructor, used by tests for deterministic shuffles.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            items: VecDeque::new(),
            repeat: RepeatMode::Off,
            shuffle: false,
            rng,
            dirty: false,
        }
    }

    pub fn push_back(&mut self, track: Track) {
        self.items.push_back(track);
        self.dirty = true;
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        let track = self.items.pop_front();
        if track.is_some() {
            self.dirty = true;
        }
        track
    }

    /// Remove the track at `index`, shifting the rest forward.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let track = self.items.remove(index);
        if track.is_some() {
            self.dirty = true;
        }
        track
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            self.dirty = true;
        }
        self.items.clear();
    }

    /// Fisher-Yates over the session-local PRNG.
    pub fn shuffle_now(&mut self) {
        let len = self.items.len();
        for i in (1..len).rev() {
            let j = self.rng.gen_range(0..=i);
            self.items.swap(i, j);
        }
        if len > 1 {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) {
        let before = self.items.len();
        self.items.extend(tracks);
        if self.items.len() != before {
            self.dirty = true;
        }
    }

    /// Consume the dirty marker. Returns true when the contents changed since
    /// the last call, i.e. a store flush is due.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
