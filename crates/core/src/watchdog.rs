//! Periodic liveness sweep, grounded on `core/src/instance.rs`'s tick-loop
//! pattern and `examples/original_source/server.c`'s `check_clients`/
//! `check_games` (spec.md §4.6 "Watchdog").

use std::sync::Arc;
use std::time::Instant;

use net::SessionRegistry;
use proto::outbound::OutboundMessage;

use crate::config::ServerConfig;
use crate::game::registry::GameRegistry;

pub struct Watchdog {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionRegistry>,
    games: Arc<GameRegistry>,
}

impl Watchdog {
    pub fn new(config: Arc<ServerConfig>, sessions: Arc<SessionRegistry>, games: Arc<GameRegistry>) -> Self {
        Watchdog { config, sessions, games }
    }

    /// One sweep: marks idle sessions inactive, drops sessions well past
    /// their timeout, and expires stalled games. Called once per
    /// `watchdog_interval` by the owning task.
    pub fn sweep(&self, now: Instant) {
        self.sweep_sessions(now);
        self.sweep_games(now);
    }

    /// spec.md §4.3/§4.6: a session idle past `max_client_noresponse`
    /// (30s) is marked inactive — still seated, its figures untouched,
    /// excluded from turn eligibility — and its game is notified with
    /// `CLIENT_TIMEOUT`, advancing the turn if it was that slot's move
    /// (`MarkInactive`, §4.3). Idle past `max_client_timeout` (120s) is
    /// removed outright: if it was in a game, `leave_game` vacates its
    /// slot first and the game is notified with `CLIENT_LEFT_GAME`.
    fn sweep_sessions(&self, now: Instant) {
        for session in self.sessions.occupied() {
            let idle = session.idle_for(now);

            if idle >= self.config.max_client_timeout {
                if let Some(game_index) = session.game_index() {
                    if let Some(game) = self.games.lookup_by_index(game_index) {
                        self.leave_from_game(&game, session.index, now);
                    }
                }
                self.sessions.remove(session.index);
                continue;
            }

            if idle >= self.config.max_client_noresponse && session.is_active() {
                session.mark_inactive(now);
                if let Some(game_index) = session.game_index() {
                    if let Some(game) = self.games.lookup_by_index(game_index) {
                        self.notify_inactive(&game, session.index, now);
                    }
                }
            }
        }
    }

    /// spec.md §4.3 "MarkInactive": broadcasts `CLIENT_TIMEOUT` and
    /// advances the turn away from `session_index` if it held it, without
    /// vacating the slot.
    fn notify_inactive(&self, game: &crate::game::Game, session_index: usize, now: Instant) {
        let Some(slot) = game.slot_of(session_index) else { return };
        let active = self.active_flags(game);
        let next_slot = game.mark_inactive_turn(slot, active, now);
        let turn_clock = game.seconds_remaining(&self.config);
        self.broadcast(
            game,
            Some(slot),
            OutboundMessage::ClientTimeout { slot: slot as u8, next_slot, turn_clock },
        );
    }

    /// spec.md §4.4 "Join / Leave" as driven by the 120s removal: a full
    /// slot-vacate, broadcast as `CLIENT_LEFT_GAME` like any other leave.
    fn leave_from_game(&self, game: &crate::game::Game, session_index: usize, now: Instant) {
        let Some(slot) = game.slot_of(session_index) else { return };
        let active = self.active_flags(game);
        match game.leave(session_index, active, now) {
            crate::game::LeaveOutcome::GameClosed => self.games.remove(game.index),
            crate::game::LeaveOutcome::Left { next_slot, .. } => {
                let turn_clock = game.seconds_remaining(&self.config);
                self.broadcast(
                    game,
                    Some(slot),
                    OutboundMessage::ClientLeftGame { slot: slot as u8, next_slot, turn_clock },
                );
            }
            crate::game::LeaveOutcome::NotInGame => {}
        }
    }

    /// spec.md §4.6: a lobby that never received `START_GAME` within
    /// `game_max_lobby`, or a running game stalled past
    /// `game_max_play_state`, is forced forward or torn down.
    fn sweep_games(&self, now: Instant) {
        for game in self.games.occupied() {
            if game.lobby_expired(&self.config) {
                self.broadcast(&game, None, OutboundMessage::GameNonexistent);
                self.clear_game_index(&game);
                self.games.remove(game.index);
                continue;
            }

            if game.play_stalled(&self.config) {
                let active = self.active_flags(&game);
                let next_slot = game.force_advance(active, now);
                let turn_clock = game.seconds_remaining(&self.config);
                self.broadcast(&game, None, OutboundMessage::PlayingIndex { slot: next_slot, turn_clock });
            }
        }
    }

    /// Clears `game_index` on every occupant, matching the Game lifecycle
    /// invariant (spec.md §3) that a torn-down game leaves no session
    /// pointing at it.
    fn clear_game_index(&self, game: &crate::game::Game) {
        for occupant in game.occupied_slots().into_iter().flatten() {
            if let Some(session) = self.sessions.lookup_by_index(occupant) {
                session.set_game_index(None);
            }
        }
    }

    fn active_flags(&self, game: &crate::game::Game) -> [bool; 4] {
        let mut flags = [false; 4];
        for (slot, occupant) in game.occupied_slots().into_iter().enumerate() {
            if let Some(index) = occupant {
                if let Some(session) = self.sessions.lookup_by_index(index) {
                    flags[slot] = session.is_active();
                }
            }
        }
        flags
    }

    fn broadcast(&self, game: &crate::game::Game, skip_slot: Option<usize>, message: OutboundMessage) {
        for (slot, occupant) in game.occupied_slots().into_iter().enumerate() {
            if Some(slot) == skip_slot {
                continue;
            }
            if let Some(index) = occupant {
                if let Some(session) = self.sessions.lookup_by_index(index) {
                    session.enqueue(message.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::registry::CreateOutcome;
    use net::AdmitOutcome;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn fixtures() -> (Watchdog, Arc<ServerConfig>, Arc<SessionRegistry>, Arc<GameRegistry>) {
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = Arc::new(ServerConfig::new(bind_addr));
        let sessions = Arc::new(SessionRegistry::new(4, config.reconnect_code_len));
        let games = Arc::new(GameRegistry::new(4, config.game_code_len));
        let watchdog = Watchdog::new(config.clone(), sessions.clone(), games.clone());
        (watchdog, config, sessions, games)
    }

    #[test]
    fn idle_session_is_marked_inactive_then_removed() {
        let (watchdog, config, sessions, _games) = fixtures();
        let addr: SocketAddr = "127.0.0.1:50001".parse().unwrap();
        let AdmitOutcome::Admitted(session) = sessions.admit(addr, Instant::now()) else {
            panic!("expected admission")
        };

        let now = Instant::now();
        session.touch(now - config.max_client_noresponse - Duration::from_secs(1));
        watchdog.sweep(now);
        assert!(!session.is_active());
        assert!(sessions.lookup_by_addr(addr).is_some());

        session.touch(now - config.max_client_timeout - Duration::from_secs(1));
        watchdog.sweep(now);
        assert!(sessions.lookup_by_addr(addr).is_none());
    }

    fn sent_payload(session: &net::Session, now: Instant) -> String {
        match session.poll_send(now, Duration::from_millis(1)) {
            Some(net::Transmit::First(bytes)) | Some(net::Transmit::Retry(bytes)) => {
                String::from_utf8(bytes).unwrap()
            }
            None => panic!("expected a queued frame"),
        }
    }

    #[test]
    fn noresponse_session_in_a_game_gets_client_timeout_and_turn_advances() {
        let (watchdog, config, sessions, games) = fixtures();
        let addr_a: SocketAddr = "127.0.0.1:50020".parse().unwrap();
        let addr_b: SocketAddr = "127.0.0.1:50021".parse().unwrap();
        let AdmitOutcome::Admitted(a) = sessions.admit(addr_a, Instant::now()) else {
            panic!("expected admission")
        };
        let AdmitOutcome::Admitted(b) = sessions.admit(addr_b, Instant::now()) else {
            panic!("expected admission")
        };

        let CreateOutcome::Created(game) = games.create(a.index, Instant::now()) else {
            panic!("expected creation")
        };
        game.join(b.index);
        a.set_game_index(Some(game.index));
        b.set_game_index(Some(game.index));
        game.start(Instant::now());

        let now = Instant::now();
        a.touch(now - config.max_client_noresponse - Duration::from_secs(1));
        watchdog.sweep(now);

        assert!(!a.is_active());
        assert!(sessions.lookup_by_addr(addr_a).is_some());
        assert!(game.slot_of(a.index).is_some());

        let payload = sent_payload(&b, now);
        let fields: Vec<&str> = payload.split(';').collect();
        assert_eq!(fields[0], "CLIENT_TIMEOUT");
        assert_eq!(fields[1], "0"); // A's slot
        assert_eq!(fields[2], "1"); // turn advanced to B
    }

    #[test]
    fn timed_out_session_in_a_game_is_removed_and_vacates_its_slot() {
        let (watchdog, config, sessions, games) = fixtures();
        let addr_a: SocketAddr = "127.0.0.1:50010".parse().unwrap();
        let addr_b: SocketAddr = "127.0.0.1:50011".parse().unwrap();
        let AdmitOutcome::Admitted(a) = sessions.admit(addr_a, Instant::now()) else {
            panic!("expected admission")
        };
        let AdmitOutcome::Admitted(b) = sessions.admit(addr_b, Instant::now()) else {
            panic!("expected admission")
        };

        let CreateOutcome::Created(game) = games.create(a.index, Instant::now()) else {
            panic!("expected creation")
        };
        game.join(b.index);
        a.set_game_index(Some(game.index));
        b.set_game_index(Some(game.index));

        let now = Instant::now();
        a.touch(now - config.max_client_timeout - Duration::from_secs(1));
        watchdog.sweep(now);

        assert!(sessions.lookup_by_addr(addr_a).is_none());
        assert!(game.slot_of(b.index).is_some());
        assert!(game.slot_of(a.index).is_none());

        let payload = sent_payload(&b, now);
        assert_eq!(payload.split(';').next().unwrap(), "CLIENT_LEFT_GAME");
    }

    #[test]
    fn lobby_expires_after_game_max_lobby_and_clears_occupants() {
        let (watchdog, config, sessions, games) = fixtures();
        let addr: SocketAddr = "127.0.0.1:50030".parse().unwrap();
        let AdmitOutcome::Admitted(session) = sessions.admit(addr, Instant::now()) else {
            panic!("expected admission")
        };

        let old_start = Instant::now() - config.game_max_lobby - Duration::from_secs(1);
        let CreateOutcome::Created(game) = games.create(session.index, old_start) else {
            panic!("expected creation")
        };
        session.set_game_index(Some(game.index));
        let game_index = game.index;

        let now = Instant::now();
        watchdog.sweep(now);

        assert!(games.lookup_by_index(game_index).is_none());
        assert!(session.game_index().is_none());
    }
}
