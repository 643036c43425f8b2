use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::common::errors::{PlayerError, Result};
use crate::common::types::{ChannelId, GuildId, Shared, UserId};
use crate::configs::PlayerConfig;
use crate::gateway::VoiceGateway;
use crate::persist::QueueStore;
use crate::player::context::{Player, PlayerStatus};
use crate::policy::{PolicyStore, is_query_allowed};
use crate::protocol::tracks::Track;
use crate::queue::RepeatMode;

/// What happened to a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The session was idle; the track started immediately.
    Started(Track),
    /// Appended behind the current track; position in the queue.
    Queued(usize),
}

/// Cloneable façade over one guild's player.
///
/// Every operation takes the per-session mutex for its whole state change, so
/// commands on the same guild observe a total order while different guilds
/// proceed in parallel. The supervisor uses the same guard, which keeps its
/// policy decisions from interleaving with a running command.
#[derive(Clone)]
pub struct PlayerHandle {
    guild_id: GuildId,
    inner: Shared<Player>,
    gateway: Arc<dyn VoiceGateway>,
    store: Arc<dyn QueueStore>,
    policies: Arc<dyn PolicyStore>,
    config: PlayerConfig,
}

impl PlayerHandle {
    pub fn new(
        player: Player,
        gateway: Arc<dyn VoiceGateway>,
        store: Arc<dyn QueueStore>,
        policies: Arc<dyn PolicyStore>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            guild_id: player.guild_id,
            inner: Arc::new(Mutex::new(player)),
            gateway,
            store,
            policies,
            config,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Lock the underlying player. Intended for snapshot reads (stats,
    /// supervisor classification); mutations belong in the methods below.
    pub async fn lock(&self) -> MutexGuard<'_, Player> {
        self.inner.lock().await
    }

    pub async fn status(&self) -> PlayerStatus {
        self.inner.lock().await.status
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.lock().await.paused
    }

    pub async fn current_requester(&self) -> Option<UserId> {
        self.inner.lock().await.current.as_ref().map(|t| t.requester)
    }

    pub async fn channel_id(&self) -> ChannelId {
        self.inner.lock().await.channel_id
    }

    /// Enqueue a track, promoting it to the current slot when the session is
    /// idle. The query is checked against the guild and global keyword
    /// policies first.
    pub async fn play(&self, track: Track) -> Result<PlayOutcome> {
        let guild_policy = self.policies.guild(self.guild_id);
        let global = self.policies.global();
        if !is_query_allowed(&track.uri, Some(&guild_policy), &global) {
            return Err(PlayerError::DisallowedQuery);
        }

        let mut p = self.inner.lock().await;
        if p.status.is_draining() {
            return Err(PlayerError::SessionClosing);
        }

        p.queue.push_back(track);
        p.touch();

        let outcome = if p.current.is_none() {
            // The pop yields the queue head: the appended track when the
            // queue was empty, or the restored head for a session rebuilt
            // from the store.
            let Some(next) = p.queue.pop_front() else {
                return Err(PlayerError::NothingPlaying);
            };
            p.current = Some(next.clone());
            p.status = PlayerStatus::Playing;
            p.paused = false;

            let res = self.control(self.gateway.play(self.guild_id, &next)).await;
            self.flush(&mut p).await;
            if let Err(err) = res {
                drop(p);
                return self.fail(err).await;
            }
            info!("started {} in guild {}", next.uri, self.guild_id);
            PlayOutcome::Started(next)
        } else {
            self.flush(&mut p).await;
            PlayOutcome::Queued(p.queue.len())
        };

        Ok(outcome)
    }

    /// Drop the current track and promote the next queue head. An explicit
    /// skip advances even under repeat-one.
    pub async fn skip(&self) -> Result<Option<Track>> {
        let mut p = self.inner.lock().await;
        if p.status.is_draining() {
            return Err(PlayerError::SessionClosing);
        }
        if p.current.is_none() {
            return Err(PlayerError::NothingPlaying);
        }

        let res = self.advance_locked(&mut p, false).await;
        self.flush(&mut p).await;
        match res {
            Ok(next) => Ok(next),
            Err(err) => {
                drop(p);
                self.fail(err).await
            }
        }
    }

    /// Natural track-end advancement, driven by the gateway's event stream.
    /// Repeat-one replays the ended track; repeat-all re-appends it to the
    /// tail before popping.
    pub async fn handle_track_end(&self) -> Result<Option<Track>> {
        let mut p = self.inner.lock().await;
        if p.status.is_draining() || p.current.is_none() {
            // Stale event for a track we already dropped.
            return Ok(None);
        }

        let res = self.advance_locked(&mut p, true).await;
        self.flush(&mut p).await;
        match res {
            Ok(next) => Ok(next),
            Err(err) => {
                drop(p);
                self.fail(err).await
            }
        }
    }

    async fn advance_locked(
        &self,
        p: &mut Player,
        natural: bool,
    ) -> Result<Option<Track>> {
        let ended = p.current.take();

        if natural && p.queue.repeat == RepeatMode::One {
            if let Some(t) = ended {
                p.current = Some(t.clone());
                p.status = PlayerStatus::Playing;
                p.paused = false;
                self.control(self.gateway.play(self.guild_id, &t)).await?;
                return Ok(p.current.clone());
            }
        } else if p.queue.repeat == RepeatMode::All {
            if let Some(t) = ended {
                p.queue.push_back(t);
            }
        }

        match p.queue.pop_front() {
            Some(next) => {
                p.current = Some(next.clone());
                p.status = PlayerStatus::Playing;
                p.paused = false;
                self.control(self.gateway.play(self.guild_id, &next)).await?;
                Ok(Some(next))
            }
            None => {
                p.status = PlayerStatus::Idle;
                p.paused = false;
                Ok(None)
            }
        }
    }

    /// Set or clear the paused flag. State is applied before the gateway
    /// call and is not rolled back on a transient failure.
    pub async fn set_pause(&self, paused: bool) -> Result<()> {
        let mut p = self.inner.lock().await;
        if p.current.is_none() {
            return Err(PlayerError::NothingPlaying);
        }

        p.paused = paused;
        p.status = if paused {
            PlayerStatus::Paused
        } else {
            PlayerStatus::Playing
        };
        p.touch();

        let res = self.control(self.gateway.pause(self.guild_id, paused)).await;
        if let Err(err) = res {
            drop(p);
            return self.fail(err).await;
        }
        Ok(())
    }

    /// Unpause only if the session is still paused, deciding and acting under
    /// one guard so a user command cannot slip between the check and the
    /// gateway call. Returns whether playback was resumed.
    pub async fn resume_if_paused(&self) -> Result<bool> {
        let mut p = self.inner.lock().await;
        if p.status.is_draining() || p.current.is_none() || !p.paused {
            return Ok(false);
        }

        p.paused = false;
        p.status = PlayerStatus::Playing;
        p.touch();

        let res = self.control(self.gateway.pause(self.guild_id, false)).await;
        if let Err(err) = res {
            drop(p);
            return self.fail(err).await;
        }
        Ok(true)
    }

    /// Apply a volume, clamped to the configured ceiling (or rejected when
    /// strict). Returns the volume actually applied.
    pub async fn set_volume(&self, volume: u16) -> Result<u16> {
        let applied = if volume > self.config.max_volume {
            if self.config.strict_volume {
                return Err(PlayerError::OutOfRange("volume"));
            }
            self.config.max_volume
        } else {
            volume
        };

        let mut p = self.inner.lock().await;
        p.volume = applied;
        let res = self
            .control(self.gateway.set_volume(self.guild_id, applied))
            .await;
        if let Err(err) = res {
            drop(p);
            return self.fail(err).await;
        }
        Ok(applied)
    }

    /// Store one equalizer band gain and push the full band vector to the
    /// gateway. Returns the gain actually stored (after clamping).
    pub async fn set_eq_band(&self, band: usize, gain: f32) -> Result<f32> {
        let mut p = self.inner.lock().await;
        let stored = p.eq.set_gain(band, gain)?;
        let bands = *p.eq.bands();
        let res = self.control(self.gateway.set_eq(self.guild_id, &bands)).await;
        if let Err(err) = res {
            drop(p);
            return self.fail(err).await;
        }
        Ok(stored)
    }

    pub async fn visualise_eq(&self) -> String {
        self.inner.lock().await.eq.visualise()
    }

    /// Remove a pending track by queue index.
    pub async fn remove_track(&self, index: usize) -> Result<Track> {
        let mut p = self.inner.lock().await;
        let removed = p
            .queue
            .remove(index)
            .ok_or(PlayerError::OutOfRange("queue index"))?;
        self.flush(&mut p).await;
        Ok(removed)
    }

    pub async fn set_repeat(&self, mode: RepeatMode) {
        self.inner.lock().await.queue.repeat = mode;
    }

    pub async fn shuffle_queue(&self) {
        let mut p = self.inner.lock().await;
        p.queue.shuffle = true;
        p.queue.shuffle_now();
        self.flush(&mut p).await;
    }

    /// Clear the queue and drop the current track; the session stays
    /// connected and idle. A clean stop also clears the persisted entry.
    pub async fn stop(&self) -> Result<()> {
        let mut p = self.inner.lock().await;
        p.queue.clear();
        let _ = p.queue.take_dirty();
        p.current = None;
        p.paused = false;
        p.status = PlayerStatus::Idle;
        p.touch();

        let res = self.control(self.gateway.stop(self.guild_id)).await;
        if let Err(err) = self.store.drop_queue(self.guild_id).await {
            debug!("queue store drop failed for {}: {err}", self.guild_id);
        }
        if let Err(err) = res {
            drop(p);
            return self.fail(err).await;
        }
        Ok(())
    }

    /// Stop, close the gateway connection, and mark the session Closed.
    ///
    /// Purge order: persisted queue entry, autoplay marker, playback, gateway
    /// connection, auto-play channel list. A gateway that no longer knows
    /// this player is not an error here; calling disconnect on an
    /// already-closed session is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let mut p = self.inner.lock().await;
        if p.status == PlayerStatus::Closed {
            return Ok(());
        }
        p.status = PlayerStatus::Disconnecting;

        if let Err(err) = self.store.drop_queue(self.guild_id).await {
            debug!("queue store drop failed for {}: {err}", self.guild_id);
        }
        p.autoplay_notified = false;
        p.queue.clear();
        let _ = p.queue.take_dirty();
        p.current = None;
        p.paused = false;

        let stop_res = self.control(self.gateway.stop(self.guild_id)).await;
        let dc_res = self.control(self.gateway.disconnect(self.guild_id)).await;
        p.status = PlayerStatus::Closed;
        self.policies.clear_auto_play_channels(self.guild_id);
        info!("session closed for guild {}", self.guild_id);

        for res in [stop_res, dc_res] {
            match res {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    // The gateway already lost this player; nothing to undo.
                    debug!("gateway had no player for {}: {err}", self.guild_id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Bounded timeout around a gateway control call. A timeout is reported
    /// as transient; session state is not rolled back.
    async fn control<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(Duration::from_millis(self.config.control_timeout_ms), fut)
            .await
        {
            Ok(res) => res,
            Err(_) => Err(PlayerError::GatewayUnavailable(
                "gateway control call timed out".into(),
            )),
        }
    }

    /// Flush the queue's write-behind replica when it changed. Store failures
    /// never fail the command; the in-memory queue stays authoritative.
    async fn flush(&self, p: &mut Player) {
        if p.queue.take_dirty() {
            let tracks = p.queue.tracks();
            if let Err(err) = self.store.put(self.guild_id, p.channel_id, &tracks).await {
                debug!("queue store write failed for {}: {err}", self.guild_id);
            }
        }
    }

    /// Route an operation error, tearing the session down when it is fatal.
    /// Must be called with the player lock released.
    async fn fail<T>(&self, err: PlayerError) -> Result<T> {
        if err.is_fatal() {
            debug!(
                "fatal gateway error for {}: {err}; tearing session down",
                self.guild_id
            );
            self.teardown().await;
        }
        Err(err)
    }

    async fn teardown(&self) {
        if let Err(err) = self.store.drop_queue(self.guild_id).await {
            debug!("queue store drop failed for {}: {err}", self.guild_id);
        }
        {
            let mut p = self.inner.lock().await;
            p.queue.clear();
            let _ = p.queue.take_dirty();
            p.current = None;
            p.paused = false;
            p.autoplay_notified = false;
            p.status = PlayerStatus::Closed;
        }
        let _ = self.gateway.disconnect(self.guild_id).await;
        self.policies.clear_auto_play_channels(self.guild_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::gateway::mock::MockGateway;
    use crate::persist::MemoryQueueStore;
    use crate::policy::{GlobalPolicy, MemoryPolicyStore};
    use crate::protocol::tracks::SourceKind;

    const GUILD: GuildId = GuildId(1);
    const CHANNEL: ChannelId = ChannelId(2);

    struct Fixture {
        gateway: Arc<MockGateway>,
        store: Arc<MemoryQueueStore>,
        handle: PlayerHandle,
    }

    fn fixture_with(config: PlayerConfig, policies: Arc<MemoryPolicyStore>) -> Fixture {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryQueueStore::new());
        let mut player = Player::new(GUILD, CHANNEL);
        player.status = PlayerStatus::Idle;
        let handle = PlayerHandle::new(
            player,
            gateway.clone(),
            store.clone(),
            policies,
            config,
        );
        Fixture {
            gateway,
            store,
            handle,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PlayerConfig::default(), Arc::new(MemoryPolicyStore::new()))
    }

    fn track(n: u64) -> Track {
        Track {
            uri: format!("https://example.com/{n}"),
            title: format!("t{n}"),
            duration_ms: 1000,
            requester: UserId(n),
            source: SourceKind::HttpStream,
            is_stream: false,
        }
    }

    #[tokio::test]
    async fn test_play_promotes_when_idle_and_queues_otherwise() {
        let fx = fixture();
        let first = fx.handle.play(track(1)).await.unwrap();
        assert_eq!(first, PlayOutcome::Started(track(1)));
        assert_eq!(fx.handle.status().await, PlayerStatus::Playing);

        let second = fx.handle.play(track(2)).await.unwrap();
        assert_eq!(second, PlayOutcome::Queued(1));
        let third = fx.handle.play(track(3)).await.unwrap();
        assert_eq!(third, PlayOutcome::Queued(2));

        // Every enqueue flushed the persisted copy.
        assert!(fx.store.contains(GUILD));
    }

    #[tokio::test]
    async fn test_skip_advances_in_order() {
        let fx = fixture();
        for n in 1..=3 {
            fx.handle.play(track(n)).await.unwrap();
        }

        let next = fx.handle.skip().await.unwrap();
        assert_eq!(next.unwrap().requester, UserId(2));
        let next = fx.handle.skip().await.unwrap();
        assert_eq!(next.unwrap().requester, UserId(3));

        // Queue exhausted; the session idles.
        assert!(fx.handle.skip().await.unwrap().is_none());
        assert_eq!(fx.handle.status().await, PlayerStatus::Idle);
        assert!(matches!(
            fx.handle.skip().await,
            Err(PlayerError::NothingPlaying)
        ));
    }

    #[tokio::test]
    async fn test_repeat_one_replays_on_natural_end_only() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();
        fx.handle.play(track(2)).await.unwrap();
        fx.handle.set_repeat(RepeatMode::One).await;

        // Natural end replays the same track.
        let replayed = fx.handle.handle_track_end().await.unwrap();
        assert_eq!(replayed.unwrap().requester, UserId(1));

        // An explicit skip still advances.
        let next = fx.handle.skip().await.unwrap();
        assert_eq!(next.unwrap().requester, UserId(2));
    }

    #[tokio::test]
    async fn test_repeat_all_requeues_ended_track() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();
        fx.handle.play(track(2)).await.unwrap();
        fx.handle.set_repeat(RepeatMode::All).await;

        let next = fx.handle.handle_track_end().await.unwrap();
        assert_eq!(next.unwrap().requester, UserId(2));
        let next = fx.handle.handle_track_end().await.unwrap();
        assert_eq!(next.unwrap().requester, UserId(1));
    }

    #[tokio::test]
    async fn test_stale_track_end_is_ignored() {
        let fx = fixture();
        assert_eq!(fx.handle.handle_track_end().await.unwrap(), None);
        assert_eq!(fx.handle.status().await, PlayerStatus::Idle);
    }

    #[tokio::test]
    async fn test_resume_if_paused_only_acts_on_paused_sessions() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();
        fx.handle.set_pause(true).await.unwrap();

        assert!(fx.handle.resume_if_paused().await.unwrap());
        assert!(!fx.handle.is_paused().await);
        assert_eq!(fx.handle.status().await, PlayerStatus::Playing);

        // Already playing: nothing to do, no gateway traffic.
        let before = fx.gateway.calls().len();
        assert!(!fx.handle.resume_if_paused().await.unwrap());
        assert_eq!(fx.gateway.calls().len(), before);

        // Idle session: nothing to resume either.
        fx.handle.skip().await.unwrap();
        assert_eq!(fx.handle.status().await, PlayerStatus::Idle);
        assert!(!fx.handle.resume_if_paused().await.unwrap());
    }

    #[tokio::test]
    async fn test_volume_clamps_by_default_and_rejects_when_strict() {
        let fx = fixture();
        assert_eq!(fx.handle.set_volume(120).await.unwrap(), 120);
        assert_eq!(fx.handle.set_volume(500).await.unwrap(), 150);
        assert_eq!(*fx.gateway.volumes.get(&GUILD).unwrap(), 150);

        let strict = fixture_with(
            PlayerConfig {
                strict_volume: true,
                ..Default::default()
            },
            Arc::new(MemoryPolicyStore::new()),
        );
        assert!(matches!(
            strict.handle.set_volume(500).await,
            Err(PlayerError::OutOfRange("volume"))
        ));
    }

    #[tokio::test]
    async fn test_eq_band_pushes_full_vector() {
        let fx = fixture();
        let stored = fx.handle.set_eq_band(3, 2.0).await.unwrap();
        assert_eq!(stored, 1.0);

        let pushed = *fx.gateway.eq_pushes.get(&GUILD).unwrap();
        assert_eq!(pushed[3], 1.0);
        assert!(pushed.iter().enumerate().all(|(i, g)| i == 3 || *g == 0.0));
    }

    #[tokio::test]
    async fn test_disallowed_query_is_rejected_before_any_state_change() {
        let policies = Arc::new(MemoryPolicyStore::new());
        policies.set_global(GlobalPolicy {
            url_deny: HashSet::from(["example.com".to_string()]),
            ..Default::default()
        });
        let fx = fixture_with(PlayerConfig::default(), policies);

        assert!(matches!(
            fx.handle.play(track(1)).await,
            Err(PlayerError::DisallowedQuery)
        ));
        assert_eq!(fx.handle.status().await, PlayerStatus::Idle);
        assert!(!fx.store.contains(GUILD));
    }

    #[tokio::test]
    async fn test_stop_keeps_the_session_connected() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();
        fx.handle.play(track(2)).await.unwrap();

        fx.handle.stop().await.unwrap();
        assert_eq!(fx.handle.status().await, PlayerStatus::Idle);
        assert!(!fx.store.contains(GUILD));
        // Still eligible for a fresh play.
        fx.handle.play(track(3)).await.unwrap();
        assert_eq!(fx.handle.status().await, PlayerStatus::Playing);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_drains_commands() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();

        fx.handle.disconnect().await.unwrap();
        assert_eq!(fx.handle.status().await, PlayerStatus::Closed);
        fx.handle.disconnect().await.unwrap();

        assert!(matches!(
            fx.handle.play(track(2)).await,
            Err(PlayerError::SessionClosing)
        ));
        assert!(matches!(
            fx.handle.skip().await,
            Err(PlayerError::SessionClosing)
        ));
    }

    #[tokio::test]
    async fn test_fatal_gateway_error_tears_the_session_down() {
        let fx = fixture();
        fx.handle.play(track(1)).await.unwrap();

        fx.gateway.missing_players.insert(GUILD, ());
        let err = fx.handle.set_pause(true).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(fx.handle.status().await, PlayerStatus::Closed);
        assert!(!fx.store.contains(GUILD));
    }
}
