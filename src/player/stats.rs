use std::collections::HashMap;

use crate::common::types::UserId;
use crate::player::context::Player;

/// One requester's share of the queue plus the current track.
#[derive(Debug, Clone, PartialEq)]
pub struct RequesterShare {
    pub user: UserId,
    pub count: usize,
    /// Percent of all queued tracks, rounded to one decimal.
    pub percent: f64,
}

/// Count per-requester occurrences over the queue and the current track and
/// return the top 20, descending. Pure function of the session snapshot;
/// keyed by user id, never by display name.
pub fn requester_breakdown(player: &Player) -> Vec<RequesterShare> {
    let mut counts: HashMap<UserId, usize> = HashMap::new();
    let mut total = 0usize;

    for track in player.queue.iter() {
        *counts.entry(track.requester).or_insert(0) += 1;
        total += 1;
    }
    if let Some(current) = &player.current {
        *counts.entry(current.requester).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return Vec::new();
    }

    let mut shares: Vec<RequesterShare> = counts
        .into_iter()
        .map(|(user, count)| RequesterShare {
            user,
            count,
            percent: (count as f64 / total as f64 * 1000.0).round() / 10.0,
        })
        .collect();

    // Descending by share; user id breaks ties so the order is stable.
    shares.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.user.cmp(&b.user))
    });
    shares.truncate(20);
    shares
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
