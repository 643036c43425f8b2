use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::common::types::{ChannelId, GuildId, Request, RoleId, UserId};

/// Per-guild playback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildPolicy {
    #[serde(default)]
    pub dj_enabled: bool,
    pub dj_role: Option<RoleId>,
    #[serde(default)]
    pub emptydc_enabled: bool,
    #[serde(default = "default_empty_timer")]
    pub emptydc_timer: Duration,
    #[serde(default)]
    pub emptypause_enabled: bool,
    #[serde(default = "default_empty_timer")]
    pub emptypause_timer: Duration,
    #[serde(default)]
    pub url_allow: HashSet<String>,
    #[serde(default)]
    pub url_deny: HashSet<String>,
    /// Channels the bot is currently auto-playing in; cleared on purge.
    #[serde(default)]
    pub auto_play_channels: Vec<ChannelId>,
}

fn default_empty_timer() -> Duration {
    Duration::from_secs(60)
}

impl Default for GuildPolicy {
    fn default() -> Self {
        Self {
            dj_enabled: false,
            dj_role: None,
            emptydc_enabled: false,
            emptydc_timer: default_empty_timer(),
            emptypause_enabled: false,
            emptypause_timer: default_empty_timer(),
            url_allow: HashSet::new(),
            url_deny: HashSet::new(),
            auto_play_channels: Vec::new(),
        }
    }
}

/// Bot-wide keyword policy. Strictly dominates the guild scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalPolicy {
    #[serde(default)]
    pub url_allow: HashSet<String>,
    #[serde(default)]
    pub url_deny: HashSet<String>,
}

/// Read access to guild and global policy, plus the one write the lifecycle
/// supervisor needs (clearing the auto-play channel list on purge).
pub trait PolicyStore: Send + Sync {
    fn guild(&self, guild: GuildId) -> GuildPolicy;
    fn global(&self) -> GlobalPolicy;
    fn clear_auto_play_channels(&self, guild: GuildId);
}

/// In-memory policy store. Guilds without an entry fall back to defaults.
#[derive(Default)]
pub struct MemoryPolicyStore {
    guilds: DashMap<GuildId, GuildPolicy>,
    global: RwLock<GlobalPolicy>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_guild(&self, guild: GuildId, policy: GuildPolicy) {
        self.guilds.insert(guild, policy);
    }

    pub fn set_global(&self, policy: GlobalPolicy) {
        *self.global.write() = policy;
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn guild(&self, guild: GuildId) -> GuildPolicy {
        self.guilds
            .get(&guild)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn global(&self) -> GlobalPolicy {
        self.global.read().clone()
    }

    fn clear_auto_play_channels(&self, guild: GuildId) {
        if let Some(mut entry) = self.guilds.get_mut(&guild) {
            entry.auto_play_channels.clear();
        }
    }
}

/// Lowercase the query and rewrite structured search references to their
/// plain search-term form so keyword tokens can match them.
pub fn normalize_query(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace("ytsearch:", "youtubesearch")
        .replace("scsearch:", "soundcloudsearch")
}

/// Decide whether a query may be enqueued under the given policies.
///
/// Evaluation short-circuits scope by scope: a non-empty allow-list decides
/// alone for its scope, and the global scope always wins over the guild one.
/// Matching is case-insensitive substring containment, so the result cannot
/// depend on token insertion order.
pub fn is_query_allowed(query: &str, guild: Option<&GuildPolicy>, global: &GlobalPolicy) -> bool {
    let query = normalize_query(query);

    if !global.url_allow.is_empty() {
        return global
            .url_allow
            .iter()
            .any(|i| query.contains(&i.to_lowercase()));
    }
    if global
        .url_deny
        .iter()
        .any(|i| query.contains(&i.to_lowercase()))
    {
        return false;
    }

    let Some(guild) = guild else {
        return true;
    };
    if !guild.url_allow.is_empty() {
        return guild
            .url_allow
            .iter()
            .any(|i| query.contains(&i.to_lowercase()));
    }
    guild
        .url_deny
        .iter()
        .all(|i| !query.contains(&i.to_lowercase()))
}

/// DJ arbitration: with DJ mode off anyone may manage playback; otherwise
/// the DJ role or being the requester of the current track is required.
pub fn can_manage_playback(
    req: &Request,
    policy: &GuildPolicy,
    current_requester: Option<UserId>,
) -> bool {
    if !policy.dj_enabled {
        return true;
    }
    if let Some(role) = policy.dj_role {
        if req.roles.contains(&role) {
            return true;
        }
    }
    current_requester == Some(req.user)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_allows_everything() {
        let guild = GuildPolicy::default();
        let global = GlobalPolicy::default();
        assert!(is_query_allowed(
            "https://example.com/whatever",
            Some(&guild),
            &global
        ));
    }

    #[test]
    fn test_global_allow_dominates_guild_deny() {
        let global = GlobalPolicy {
            url_allow: tokens(&["soundcloud.com"]),
            ..Default::default()
        };
        let guild = GuildPolicy {
            url_deny: tokens(&["soundcloud.com"]),
            ..Default::default()
        };
        assert!(is_query_allowed(
            "https://soundcloud.com/x/y",
            Some(&guild),
            &global
        ));
    }

    #[test]
    fn test_global_allow_excludes_everything_else() {
        let global = GlobalPolicy {
            url_allow: tokens(&["soundcloud.com"]),
            ..Default::default()
        };
        assert!(!is_query_allowed(
            "https://youtube.com/watch?v=abc",
            None,
            &global
        ));
    }

    #[test]
    fn test_global_deny_blocks() {
        let global = GlobalPolicy {
            url_deny: tokens(&["badsite.example"]),
            ..Default::default()
        };
        assert!(!is_query_allowed(
            "https://badsite.example/track",
            None,
            &global
        ));
        assert!(is_query_allowed("https://goodsite.example", None, &global));
    }

    #[test]
    fn test_guild_allow_overrides_guild_deny() {
        let guild = GuildPolicy {
            url_allow: tokens(&["bandcamp.com"]),
            url_deny: tokens(&["bandcamp.com"]),
            ..Default::default()
        };
        let global = GlobalPolicy::default();
        assert!(is_query_allowed(
            "https://artist.bandcamp.com/album",
            Some(&guild),
            &global
        ));
        assert!(!is_query_allowed(
            "https://vimeo.com/12345",
            Some(&guild),
            &global
        ));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let guild = GuildPolicy {
            url_deny: tokens(&["SoundCloud.COM"]),
            ..Default::default()
        };
        let global = GlobalPolicy::default();
        assert!(!is_query_allowed(
            "HTTPS://SOUNDCLOUD.COM/x",
            Some(&guild),
            &global
        ));
    }

    #[test]
    fn test_structured_reference_rewrite() {
        let guild = GuildPolicy {
            url_deny: tokens(&["youtubesearch"]),
            ..Default::default()
        };
        let global = GlobalPolicy::default();
        assert!(!is_query_allowed(
            "ytsearch:never gonna give you up",
            Some(&guild),
            &global
        ));
    }

    #[test]
    fn test_determinism() {
        let guild = GuildPolicy {
            url_allow: tokens(&["a.example", "b.example", "c.example"]),
            ..Default::default()
        };
        let global = GlobalPolicy::default();
        let first = is_query_allowed("https://b.example/t", Some(&guild), &global);
        for _ in 0..10 {
            assert_eq!(
                first,
                is_query_allowed("https://b.example/t", Some(&guild), &global)
            );
        }
    }

    #[test]
    fn test_dj_disabled_allows_anyone() {
        let req = Request::new(GuildId(1), ChannelId(2), UserId(3));
        assert!(can_manage_playback(&req, &GuildPolicy::default(), None));
    }

    #[test]
    fn test_dj_role_grants_control() {
        let policy = GuildPolicy {
            dj_enabled: true,
            dj_role: Some(RoleId(99)),
            ..Default::default()
        };
        let req = Request::new(GuildId(1), ChannelId(2), UserId(3)).with_roles(vec![RoleId(99)]);
        assert!(can_manage_playback(&req, &policy, None));

        let outsider = Request::new(GuildId(1), ChannelId(2), UserId(4));
        assert!(!can_manage_playback(&outsider, &policy, None));
    }

    #[test]
    fn test_requester_can_manage_own_track() {
        let policy = GuildPolicy {
            dj_enabled: true,
            ..Default::default()
        };
        let req = Request::new(GuildId(1), ChannelId(2), UserId(3));
        assert!(can_manage_playback(&req, &policy, Some(UserId(3))));
        assert!(!can_manage_playback(&req, &policy, Some(UserId(7))));
    }

    #[test]
    fn test_clear_auto_play_channels() {
        let store = MemoryPolicyStore::new();
        store.set_guild(
            GuildId(5),
            GuildPolicy {
                auto_play_channels: vec![ChannelId(10), ChannelId(11)],
                ..Default::default()
            },
        );
        store.clear_auto_play_channels(GuildId(5));
        assert!(store.guild(GuildId(5)).auto_play_channels.is_empty());
        // A guild with no entry is a no-op, not a panic.
        store.clear_auto_play_channels(GuildId(6));
    }
}
