pub mod commands;
pub mod context;
pub mod equalizer;
pub mod registry;
pub mod stats;

pub use commands::{PlayOutcome, PlayerHandle};
pub use context::{Player, PlayerStatus};
pub use equalizer::{BAND_COUNT, Equalizer};
pub use registry::PlayerRegistry;
pub use stats::{RequesterShare, requester_breakdown};
