use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::common::types::GuildId;
use crate::gateway::VoiceGateway;
use crate::player::context::PlayerStatus;
use crate::player::registry::PlayerRegistry;
use crate::policy::PolicyStore;
use crate::scheduler::Clock;

/// Scans all live sessions once per tick and applies the vacancy policies:
/// empty-channel disconnect, empty-channel pause, automatic unpause when
/// humans return, and purging of sessions whose guild disappeared.
///
/// Timer state is ephemeral supervisor state, not session state. The
/// `auto_paused` set records pauses the supervisor itself applied; a pause
/// requested by a user is never auto-reverted. The disconnect timer keeps
/// counting while a session is auto-paused.
///
/// Errors from any one session are logged at debug and never stop the scan.
pub struct LifecycleSupervisor {
    registry: Arc<PlayerRegistry>,
    gateway: Arc<dyn VoiceGateway>,
    policies: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
    stop_since: HashMap<GuildId, Instant>,
    pause_since: HashMap<GuildId, Instant>,
    auto_paused: HashSet<GuildId>,
}

impl LifecycleSupervisor {
    pub fn new(
        registry: Arc<PlayerRegistry>,
        policies: Arc<dyn PolicyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gateway = registry.gateway();
        Self {
            registry,
            gateway,
            policies,
            clock,
            stop_since: HashMap::new(),
            pause_since: HashMap::new(),
            auto_paused: HashSet::new(),
        }
    }

    /// One supervisory pass. Invoked by the tick scheduler.
    pub async fn tick(&mut self) {
        let now = self.clock.now();

        for handle in self.registry.all() {
            let guild = handle.guild_id();

            if handle.status().await == PlayerStatus::Closed {
                self.forget(guild);
                self.registry.remove(guild);
                continue;
            }

            if !self.gateway.guild_visible(guild) {
                info!("guild {guild} no longer visible; purging session");
                self.forget(guild);
                if let Err(err) = handle.disconnect().await {
                    debug!("orphan disconnect failed for {guild}: {err}");
                }
                self.registry.remove(guild);
                continue;
            }

            if self.is_vacant(guild) {
                self.stop_since.entry(guild).or_insert(now);
                self.pause_since.entry(guild).or_insert(now);
            } else {
                self.stop_since.remove(&guild);
                if self.auto_paused.contains(&guild) {
                    // The paused check and the unpause run under one session
                    // guard inside the handle.
                    if let Err(err) = handle.resume_if_paused().await {
                        debug!("unpause failed for {guild}: {err}");
                    }
                }
                self.pause_since.remove(&guild);
                self.auto_paused.remove(&guild);
            }
        }

        let tracked: HashSet<GuildId> = self
            .stop_since
            .keys()
            .chain(self.pause_since.keys())
            .copied()
            .collect();

        for guild in tracked {
            let Some(handle) = self.registry.get(guild) else {
                self.forget(guild);
                continue;
            };
            let policy = self.policies.guild(guild);

            if let Some(&since) = self.stop_since.get(&guild) {
                if policy.emptydc_enabled && now.duration_since(since) >= policy.emptydc_timer {
                    info!("empty-channel timeout for {guild}; disconnecting");
                    self.forget(guild);
                    if let Err(err) = handle.disconnect().await {
                        debug!("emptydc disconnect failed for {guild}: {err}");
                    }
                    self.registry.remove(guild);
                    continue;
                }
            }

            if let Some(&since) = self.pause_since.get(&guild) {
                if policy.emptypause_enabled
                    && !self.auto_paused.contains(&guild)
                    && now.duration_since(since) >= policy.emptypause_timer
                {
                    match handle.set_pause(true).await {
                        Ok(()) => {
                            info!("empty-channel timeout for {guild}; pausing");
                            self.auto_paused.insert(guild);
                        }
                        Err(err) => {
                            if err.is_fatal() {
                                self.forget(guild);
                            }
                            debug!("emptypause failed for {guild}: {err}");
                        }
                    }
                }
            }
        }
    }

    /// A channel is vacant when it has members and every one of them is a
    /// bot (the managing bot included). No membership data means not vacant.
    fn is_vacant(&self, guild: GuildId) -> bool {
        match self.gateway.channel_members(guild) {
            Some(members) => !members.is_empty() && members.iter().all(|m| m.is_bot),
            None => false,
        }
    }

    fn forget(&mut self, guild: GuildId) {
        self.stop_since.remove(&guild);
        self.pause_since.remove(&guild);
        self.auto_paused.remove(&guild);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
