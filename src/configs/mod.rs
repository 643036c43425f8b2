pub mod base;
pub mod logging;
pub mod player;
pub mod scheduler;

pub use base::*;
pub use logging::*;
pub use player::*;
pub use scheduler::*;
