//! Protocol and default tuning constants (spec.md §6 "Constants").
//!
//! These are the defaults a freshly constructed `ServerConfig` starts from
//! in `ludo-core`; everything here is a `const`, not runtime state.

use std::time::Duration;

/// The fixed token string that prefixes every frame.
pub const APP_TOKEN: &str = "LUDO";

/// Also the maximum number of simultaneous games, per spec.md §6.
pub const MAX_CONCURRENT_CLIENTS: usize = 100;

pub const MAX_DGRAM_SIZE: usize = 512;

pub const MAX_PACKET_AGE: Duration = Duration::from_micros(500_000);

pub const MAX_CLIENT_NORESPONSE: Duration = Duration::from_secs(30);

pub const MAX_CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

pub const GAME_CODE_LEN: usize = 5;

pub const GAME_MAX_LOBBY: Duration = Duration::from_secs(36_000);

pub const GAME_MAX_PLAY: Duration = Duration::from_secs(45);

pub const GAME_MAX_PLAY_STATE: Duration = Duration::from_secs(180);

pub const RECONNECT_CODE_LEN: usize = 4;

/// How often the watchdog sweeps sessions and games (spec.md §4.6: "once
/// per second").
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);
