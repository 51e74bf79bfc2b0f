//! Small, protocol-agnostic helpers shared by the rest of the workspace.

pub mod rng;
pub mod time;

pub use rng::generate_code;
pub use time::Clock;
