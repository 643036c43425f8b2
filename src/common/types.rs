use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A thread-safe, read-write shared component.
pub type SharedRw<T> = Arc<RwLock<T>>;

/// Strongly typed identifiers. Guild ids are the unit of tenancy: one player
/// session exists per guild at most.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl From<u64> for GuildId {
    fn from(u: u64) -> Self {
        Self(u)
    }
}

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl From<u64> for UserId {
    fn from(u: u64) -> Self {
        Self(u)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl From<u64> for ChannelId {
    fn from(u: u64) -> Self {
        Self(u)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl From<u64> for RoleId {
    fn from(u: u64) -> Self {
        Self(u)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An explicit command context: who asked, where, and how long the work may
/// take. Passed by value into the dispatcher instead of living in ambient
/// state.
#[derive(Debug, Clone)]
pub struct Request {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub user: UserId,
    /// Roles held by the invoking member, for DJ checks.
    pub roles: Vec<RoleId>,
    pub deadline: Option<Instant>,
}

impl Request {
    pub fn new(guild: GuildId, channel: ChannelId, user: UserId) -> Self {
        Self {
            guild,
            channel,
            user,
            roles: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.roles = roles;
        self
    }

    /// Latest instant at which the dispatcher may still start this request.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
