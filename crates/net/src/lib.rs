//! The reliability layer and session registry: transport-aware, game-rule
//! agnostic (spec.md §4.2, §4.3).

pub mod queue;
pub mod registry;
pub mod session;

pub use queue::{SendQueue, Transmit};
pub use registry::{AdmitOutcome, SessionRegistry};
pub use session::{SeqOutcome, Session};
