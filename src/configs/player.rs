use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Volume ceiling applied to every session.
    #[serde(default = "default_max_volume")]
    pub max_volume: u16,
    /// When true, volumes above the ceiling are rejected instead of clamped.
    #[serde(default)]
    pub strict_volume: bool,
    /// Timeout for gateway edits (play, pause, volume, eq).
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
    /// Timeout for the initial voice connect.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_volume: default_max_volume(),
            strict_volume: false,
            control_timeout_ms: default_control_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_max_volume() -> u16 {
    150
}

fn default_control_timeout_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    10000
}
