use std::sync::Arc;
use std::time::Instant;

use crate::common::errors::{PlayerError, Result};
use crate::common::types::Request;
use crate::player::commands::{PlayOutcome, PlayerHandle};
use crate::player::registry::PlayerRegistry;
use crate::player::stats::{RequesterShare, requester_breakdown};
use crate::policy::{PolicyStore, can_manage_playback};
use crate::protocol::tracks::Track;
use crate::queue::RepeatMode;

/// User intents the bot forwards into the core, routed by name. The wording
/// shown to users lives outside this crate.
#[derive(Debug, Clone)]
pub enum Command {
    Play { track: Track },
    Skip,
    Pause(bool),
    SetVolume(u16),
    SetEqBand { band: usize, gain: f32 },
    VisualiseEq,
    RemoveTrack(usize),
    SetRepeat(RepeatMode),
    Shuffle,
    Stop,
    Disconnect,
    RequesterShares,
}

/// Structured result handed back to the bot layer.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Ack,
    Play(PlayOutcome),
    Skipped(Option<Track>),
    VolumeSet(u16),
    EqGainSet(f32),
    EqChart(String),
    TrackRemoved(Track),
    Shares(Vec<RequesterShare>),
}

/// Routes requests to the per-guild session, enforcing the DJ policy on the
/// actions that steer playback for everyone.
pub struct CommandDispatcher {
    registry: Arc<PlayerRegistry>,
    policies: Arc<dyn PolicyStore>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<PlayerRegistry>, policies: Arc<dyn PolicyStore>) -> Self {
        Self { registry, policies }
    }

    pub async fn dispatch(&self, req: Request, command: Command) -> Result<CommandOutcome> {
        // Requests carried past their deadline (an overloaded bot shard, a
        // slow queue ahead of us) are rejected instead of acting late.
        if req.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PlayerError::DeadlineExceeded);
        }

        // Play creates the session; everything else requires one.
        let handle = match &command {
            Command::Play { .. } => self.registry.get_or_create(req.guild, req.channel).await?,
            _ => self
                .registry
                .get(req.guild)
                .ok_or(PlayerError::NotConnected(req.guild))?,
        };

        match command {
            Command::Play { track } => Ok(CommandOutcome::Play(handle.play(track).await?)),
            Command::Skip => {
                self.check_dj(&req, &handle).await?;
                Ok(CommandOutcome::Skipped(handle.skip().await?))
            }
            Command::Pause(flag) => {
                self.check_dj(&req, &handle).await?;
                handle.set_pause(flag).await?;
                Ok(CommandOutcome::Ack)
            }
            Command::SetVolume(v) => Ok(CommandOutcome::VolumeSet(handle.set_volume(v).await?)),
            Command::SetEqBand { band, gain } => {
                Ok(CommandOutcome::EqGainSet(handle.set_eq_band(band, gain).await?))
            }
            Command::VisualiseEq => Ok(CommandOutcome::EqChart(handle.visualise_eq().await)),
            Command::RemoveTrack(index) => {
                self.check_dj(&req, &handle).await?;
                Ok(CommandOutcome::TrackRemoved(handle.remove_track(index).await?))
            }
            Command::SetRepeat(mode) => {
                handle.set_repeat(mode).await;
                Ok(CommandOutcome::Ack)
            }
            Command::Shuffle => {
                self.check_dj(&req, &handle).await?;
                handle.shuffle_queue().await;
                Ok(CommandOutcome::Ack)
            }
            Command::Stop => {
                self.check_dj(&req, &handle).await?;
                handle.stop().await?;
                Ok(CommandOutcome::Ack)
            }
            Command::Disconnect => {
                self.check_dj(&req, &handle).await?;
                handle.disconnect().await?;
                self.registry.remove(req.guild);
                Ok(CommandOutcome::Ack)
            }
            Command::RequesterShares => {
                let guard = handle.lock().await;
                Ok(CommandOutcome::Shares(requester_breakdown(&guard)))
            }
        }
    }

    async fn check_dj(&self, req: &Request, handle: &PlayerHandle) -> Result<()> {
        let policy = self.policies.guild(req.guild);
        let requester = handle.current_requester().await;
        if can_manage_playback(req, &policy, requester) {
            Ok(())
        } else {
            Err(PlayerError::PermissionDenied)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
