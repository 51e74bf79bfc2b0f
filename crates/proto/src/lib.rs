//! The wire protocol: frame parsing, constants, and the inbound/outbound
//! command vocabulary. Side-effect free by design (§4.1): nothing in this
//! crate touches a session, a game, or the clock.

pub mod constants;
pub mod frame;
pub mod inbound;
pub mod outbound;

pub use constants::APP_TOKEN;
pub use frame::Frame;
pub use inbound::InboundCommand;
pub use outbound::OutboundMessage;
