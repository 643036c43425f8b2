use thiserror::Error;

use crate::common::types::GuildId;

/// Errors surfaced by player operations and the lifecycle supervisor.
///
/// The supervisor never propagates these to users; it logs at debug and moves
/// on. Commands hand them to the dispatcher, which owns the user-facing
/// wording.
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("nothing is playing")]
    NothingPlaying,

    #[error("no voice session for guild {0}")]
    NotConnected(GuildId),

    #[error("that query is blocked by the keyword policy")]
    DisallowedQuery,

    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    /// Transient gateway failure; the caller may retry.
    #[error("voice gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Unrecoverable gateway failure, e.g. the gateway has no player for this
    /// guild. Tears the session down.
    #[error("voice gateway failure: {0}")]
    GatewayFatal(String),

    #[error("the DJ policy does not allow this action")]
    PermissionDenied,

    #[error("session is shutting down")]
    SessionClosing,

    /// The request's deadline passed before the command was dispatched.
    #[error("the request deadline has passed")]
    DeadlineExceeded,

    #[error("queue store: {0}")]
    Store(String),
}

impl PlayerError {
    /// True for errors that require disconnect-and-purge of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::GatewayFatal(_))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
