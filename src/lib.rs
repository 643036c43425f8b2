//! Voice session lifecycle management for chat-bot audio playback.
//!
//! Each guild gets at most one [`player::PlayerHandle`], tracked by a
//! [`player::PlayerRegistry`]. A [`supervisor::LifecycleSupervisor`] driven by
//! the [`scheduler::TickScheduler`] applies the per-guild vacancy policies
//! (auto-disconnect and auto-pause), and a [`dispatcher::CommandDispatcher`]
//! routes user commands into the sessions with DJ arbitration. Queues survive
//! restarts through the [`persist::QueueStore`] trait.

pub mod common;
pub mod configs;
pub mod dispatcher;
pub mod gateway;
pub mod persist;
pub mod player;
pub mod policy;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod supervisor;

pub use common::errors::{PlayerError, Result};
pub use common::types::{ChannelId, GuildId, Request, RoleId, UserId};
pub use configs::Config;
pub use dispatcher::{Command, CommandDispatcher, CommandOutcome};
pub use gateway::VoiceGateway;
pub use persist::QueueStore;
pub use player::{PlayerHandle, PlayerRegistry};
pub use supervisor::LifecycleSupervisor;
