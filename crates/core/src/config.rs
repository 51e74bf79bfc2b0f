//! Server-wide tunables, grounded on `core/src/config.rs`'s
//! `SERVER_CONFIG: RwLock<ServerConfig>` static: a plain struct built once
//! at startup, shared as `Arc<ServerConfig>` rather than kept as a
//! process-wide global (Design Notes §9 "Global tables").

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI8, Ordering};
use std::time::Duration;

use proto::constants;

/// Admin override for the die: `None` means roll normally, `Some(n)` pins
/// every roll to `n` (spec.md §6 CLI: `force_roll <n>`).
#[derive(Debug)]
pub struct ForceRoll(AtomicI8);

impl ForceRoll {
    const DISABLED: i8 = -1;

    fn new() -> Self {
        ForceRoll(AtomicI8::new(Self::DISABLED))
    }

    /// Sets the override. Anything outside `1..=6` disables it, matching
    /// the original CLI's "anything else disables" behavior.
    pub fn set(&self, value: i8) {
        let value = if (1..=6).contains(&value) { value } else { Self::DISABLED };
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<u8> {
        match self.0.load(Ordering::Relaxed) {
            Self::DISABLED => None,
            n => Some(n as u8),
        }
    }
}

/// Server-wide configuration, constructed once from CLI arguments at
/// startup and threaded through the registries, engine, and tasks as
/// `Arc<ServerConfig>`.
#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_concurrent_clients: usize,
    pub max_dgram_size: usize,
    pub max_packet_age: Duration,
    pub max_client_noresponse: Duration,
    pub max_client_timeout: Duration,
    pub game_code_len: usize,
    pub game_max_lobby: Duration,
    pub game_max_play: Duration,
    pub game_max_play_state: Duration,
    pub reconnect_code_len: usize,
    pub watchdog_interval: Duration,
    pub force_roll: ForceRoll,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        ServerConfig {
            bind_addr,
            max_concurrent_clients: constants::MAX_CONCURRENT_CLIENTS,
            max_dgram_size: constants::MAX_DGRAM_SIZE,
            max_packet_age: constants::MAX_PACKET_AGE,
            max_client_noresponse: constants::MAX_CLIENT_NORESPONSE,
            max_client_timeout: constants::MAX_CLIENT_TIMEOUT,
            game_code_len: constants::GAME_CODE_LEN,
            game_max_lobby: constants::GAME_MAX_LOBBY,
            game_max_play: constants::GAME_MAX_PLAY,
            game_max_play_state: constants::GAME_MAX_PLAY_STATE,
            reconnect_code_len: constants::RECONNECT_CODE_LEN,
            watchdog_interval: constants::WATCHDOG_INTERVAL,
            force_roll: ForceRoll::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_roll_rejects_out_of_range_values() {
        let roll = ForceRoll::new();
        roll.set(6);
        assert_eq!(roll.get(), Some(6));
        roll.set(7);
        assert_eq!(roll.get(), None);
        roll.set(0);
        assert_eq!(roll.get(), None);
    }
}
