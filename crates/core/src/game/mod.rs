//! The game engine: lobby/running state machine, turn advancement, and
//! move legality, grounded on `examples/original_source/game.c` (read in
//! full). `Game` owns its own lock (spec.md §3 "Game": "mutex") and every
//! public method takes it internally — dispatch never holds a game lock
//! across a session lock acquisition (spec.md §5 "Locking discipline").

pub mod board;
pub mod registry;
pub mod state;

use std::time::Instant;

use parking_lot::Mutex;
use util::time::Clock;

use crate::config::ServerConfig;
use state::{GameState, NO_PLAYER};

pub enum JoinOutcome {
    Joined { slot: usize },
    GameFull,
    GameRunning,
}

pub enum LeaveOutcome {
    /// The leaver was the sole occupant; the game should be torn down.
    GameClosed,
    Left { slot: usize, next_slot: u8 },
    NotInGame,
}

pub enum StartOutcome {
    Started { first_slot: u8 },
    /// Protocol violation: re-send `GAME_STATE` per spec.md §7.
    Recover,
}

pub enum RollOutcome {
    Rolled { value: u8, next_slot: Option<u8> },
    Recover,
}

pub struct MoveResult {
    pub dest: usize,
    pub capture: Option<(usize, usize)>,
    pub game_finished: Option<[i8; 4]>,
    pub next_slot: Option<u8>,
}

pub enum MoveOutcome {
    Moved(MoveResult),
    Recover,
}

struct GameInner {
    running: bool,
    players: [Option<usize>; 4],
    state: GameState,
    turn_clock_start: Instant,
}

/// One match. `index` and `code` are stable for the life of the game.
pub struct Game {
    pub index: usize,
    pub code: String,
    inner: Mutex<GameInner>,
}

impl Game {
    pub fn new(index: usize, code: String, creator_session: usize, now: Instant) -> Self {
        let mut players = [None; 4];
        players[0] = Some(creator_session);
        Game {
            index,
            code,
            inner: Mutex::new(GameInner {
                running: false,
                players,
                state: GameState::new(),
                turn_clock_start: now,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn player_count(&self) -> usize {
        self.inner.lock().players.iter().filter(|s| s.is_some()).count()
    }

    pub fn slot_of(&self, session_index: usize) -> Option<usize> {
        self.inner.lock().players.iter().position(|s| *s == Some(session_index))
    }

    pub fn session_at(&self, slot: usize) -> Option<usize> {
        self.inner.lock().players[slot]
    }

    pub fn occupied_slots(&self) -> [Option<usize>; 4] {
        self.inner.lock().players
    }

    /// spec.md §4.4 "Join / Leave": fails with `GameFull`/`GameRunning` as
    /// appropriate, otherwise seats the session in the lowest free slot.
    pub fn join(&self, session_index: usize) -> JoinOutcome {
        let mut inner = self.inner.lock();
        if inner.running {
            return JoinOutcome::GameRunning;
        }
        let Some(slot) = inner.players.iter().position(|s| s.is_none()) else {
            return JoinOutcome::GameFull;
        };
        inner.players[slot] = Some(session_index);
        JoinOutcome::Joined { slot }
    }

    /// spec.md §4.4 "Join / Leave": sole-occupant leave tears the game
    /// down; otherwise the leaver's tokens return to their pocket seats
    /// and the turn advances if they held it. `active` is the current
    /// activity flag of each occupied slot's session, read by the caller
    /// before acquiring this lock.
    pub fn leave(&self, session_index: usize, active: [bool; 4], now: Instant) -> LeaveOutcome {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.players.iter().position(|s| *s == Some(session_index)) else {
            return LeaveOutcome::NotInGame;
        };

        let occupants = inner.players.iter().filter(|s| s.is_some()).count();
        inner.players[slot] = None;

        if occupants <= 1 {
            return LeaveOutcome::GameClosed;
        }

        reset_slot_to_pocket(&mut inner.state, slot);

        let next_slot = if inner.running && inner.state.playing as usize == slot {
            let mut active = active;
            active[slot] = false;
            advance_turn(&mut inner, slot, active, now)
        } else {
            inner.state.playing
        };

        LeaveOutcome::Left { slot, next_slot }
    }

    /// spec.md §4.4 "State machine": requires at least one player and not
    /// every player already finished.
    pub fn start(&self, now: Instant) -> StartOutcome {
        let mut inner = self.inner.lock();
        if inner.running {
            return StartOutcome::Recover;
        }
        let Some(first) = inner.players.iter().position(|s| s.is_some()) else {
            return StartOutcome::Recover;
        };
        if all_players_finished(&inner.state, &inner.players) {
            return StartOutcome::Recover;
        }

        inner.running = true;
        inner.state.playing = first as u8;
        inner.state.playing_rolled = -1;
        inner.state.playing_rolled_times = if inner.state.has_figures_on_track(first) { 3 } else { 0 };
        inner.turn_clock_start = now;

        StartOutcome::Started { first_slot: first as u8 }
    }

    /// spec.md §4.4 "Roll".
    pub fn roll(
        &self,
        session_index: usize,
        force_roll: Option<u8>,
        active: [bool; 4],
        now: Instant,
    ) -> RollOutcome {
        let mut inner = self.inner.lock();
        if !inner.running {
            return RollOutcome::Recover;
        }
        let Some(slot) = inner.players.iter().position(|s| *s == Some(session_index)) else {
            return RollOutcome::Recover;
        };
        if inner.state.playing as usize != slot || inner.state.playing_rolled != -1 {
            return RollOutcome::Recover;
        }

        let value = match force_roll {
            Some(v) if (1..=6).contains(&v) => v,
            _ => util::rng::roll_die(),
        };
        inner.state.playing_rolled = value as i8;
        inner.state.playing_rolled_times += 1;

        let mut next_slot = None;
        if !inner.state.can_player_play(slot, value) {
            let has_track = inner.state.has_figures_on_track(slot);
            let retains_turn = value != 6 && !has_track && inner.state.playing_rolled_times < 3;
            if !retains_turn {
                next_slot = Some(advance_turn(&mut inner, slot, active, now));
            }
        }
        inner.turn_clock_start = now;

        RollOutcome::Rolled { value, next_slot }
    }

    /// spec.md §4.4 "Move".
    pub fn move_figure(
        &self,
        session_index: usize,
        figure: usize,
        active: [bool; 4],
        now: Instant,
    ) -> MoveOutcome {
        let mut inner = self.inner.lock();
        if !inner.running {
            return MoveOutcome::Recover;
        }
        let Some(slot) = inner.players.iter().position(|s| *s == Some(session_index)) else {
            return MoveOutcome::Recover;
        };
        if inner.state.playing as usize != slot
            || inner.state.playing_rolled == -1
            || board::player_of(figure) != slot
        {
            return MoveOutcome::Recover;
        }

        let roll = inner.state.playing_rolled as u8;
        let Some(dest) = inner.state.figure_destination(figure, roll) else {
            return MoveOutcome::Recover;
        };
        let capture = inner.state.apply_move(figure, dest);

        let mut game_finished = None;
        if inner.state.has_all_figures_at_home(slot) {
            inner.state.record_finish(slot);
            if all_players_finished(&inner.state, &inner.players) {
                if let Some(last) = (0..4).find(|&p| {
                    inner.players[p].is_some() && inner.state.finish_position(p) == -1
                }) {
                    inner.state.record_finish(last);
                }
                inner.running = false;
                game_finished = Some(std::array::from_fn(|p| inner.state.finish_position(p)));
            }
        }

        let next_slot = if game_finished.is_none() {
            let advance =
                roll != 6 || inner.state.has_figures_on_track(slot) || inner.state.playing_rolled_times >= 3;
            advance.then(|| advance_turn(&mut inner, slot, active, now))
        } else {
            None
        };
        inner.turn_clock_start = now;

        MoveOutcome::Moved(MoveResult { dest, capture, game_finished, next_slot })
    }

    /// Seconds remaining before the current lobby/turn timeout, the same
    /// budget computation used by `snapshot`'s `GAME_STATE` field and by
    /// the `turn_clock` field of `GAME_STARTED`/`PLAYING_INDEX`/
    /// `CLIENT_LEFT_GAME`/`CLIENT_TIMEOUT`.
    pub fn seconds_remaining(&self, cfg: &ServerConfig) -> u64 {
        let inner = self.inner.lock();
        let budget = if inner.running { cfg.game_max_play } else { cfg.game_max_lobby };
        Clock.remaining_secs(inner.turn_clock_start, budget)
    }

    /// A `GAME_STATE` snapshot for `recipient_slot`. `slot_flags` (0
    /// empty, 1 active, 2 inactive) is computed by the caller, which has
    /// access to the session registry this module does not depend on.
    pub fn snapshot(
        &self,
        recipient_slot: usize,
        slot_flags: [u8; 4],
        cfg: &ServerConfig,
    ) -> proto::outbound::GameStateFrame {
        let seconds_remaining = self.seconds_remaining(cfg);
        let inner = self.inner.lock();
        proto::outbound::GameStateFrame {
            code: self.code.clone(),
            running: inner.running,
            slot_flags,
            positions: inner.state.figures,
            turn_slot: inner.state.playing,
            own_slot: recipient_slot as u8,
            seconds_remaining,
            roll: inner.state.playing_rolled,
        }
    }

    /// spec.md §4.6 "Watchdog": lobby timed out without a `START_GAME`.
    pub fn lobby_expired(&self, cfg: &ServerConfig) -> bool {
        let inner = self.inner.lock();
        !inner.running && Clock.elapsed_secs(inner.turn_clock_start) >= cfg.game_max_lobby.as_secs()
    }

    /// spec.md §4.6: no move in `GAME_MAX_PLAY_STATE_TIME_SEC`; force the
    /// turn forward.
    pub fn play_stalled(&self, cfg: &ServerConfig) -> bool {
        let inner = self.inner.lock();
        inner.running && Clock.elapsed_secs(inner.turn_clock_start) >= cfg.game_max_play_state.as_secs()
    }

    pub fn force_advance(&self, active: [bool; 4], now: Instant) -> u8 {
        let mut inner = self.inner.lock();
        let current = inner.state.playing as usize;
        advance_turn(&mut inner, current, active, now)
    }

    /// spec.md §4.3 "MarkInactive": if `slot` currently holds the turn,
    /// advances it; the slot stays occupied and its figures are untouched
    /// (contrast `leave`, which vacates the slot). Returns the turn slot
    /// after the call, unchanged if `slot` didn't hold the turn.
    pub fn mark_inactive_turn(&self, slot: usize, active: [bool; 4], now: Instant) -> u8 {
        let mut inner = self.inner.lock();
        if inner.running && inner.state.playing as usize == slot {
            advance_turn(&mut inner, slot, active, now)
        } else {
            inner.state.playing
        }
    }
}

fn reset_slot_to_pocket(state: &mut GameState, slot: usize) {
    for figure in 4 * slot..4 * slot + 4 {
        let seat = board::pocket_seat(figure);
        let origin = state.figures[figure] as usize;
        state.fields[origin] = -1;
        state.figures[figure] = seat as u8;
        state.fields[seat] = figure as i8;
    }
}

/// spec.md §4.4 "Turn advancement": scans the next three slots, skipping
/// empty, finished, and inactive ones.
fn advance_turn(inner: &mut GameInner, current: usize, active: [bool; 4], now: Instant) -> u8 {
    for step in 1..=3 {
        let candidate = (current + step) % 4;
        if inner.players[candidate].is_none() {
            continue;
        }
        if inner.state.finish_position(candidate) != -1 {
            continue;
        }
        if !active[candidate] {
            continue;
        }

        inner.state.playing = candidate as u8;
        inner.state.playing_rolled = -1;
        inner.state.playing_rolled_times = if inner.state.has_figures_on_track(candidate) { 3 } else { 0 };
        inner.turn_clock_start = now;
        return candidate as u8;
    }

    inner.state.playing = NO_PLAYER;
    inner.state.playing_rolled = -1;
    inner.turn_clock_start = now;
    NO_PLAYER
}

/// spec.md §4.4 "Move" / `all_players_finished` in the original: the game
/// ends once at most one occupied slot remains unfinished.
fn all_players_finished(state: &GameState, players: &[Option<usize>; 4]) -> bool {
    let occupied = players.iter().filter(|s| s.is_some()).count();
    let finished = (0..4)
        .filter(|&p| players[p].is_some() && state.finish_position(p) != -1)
        .count();
    occupied.saturating_sub(finished) <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: [bool; 4] = [true, true, true, true];

    #[test]
    fn join_seats_in_lowest_free_slot_and_rejects_when_full() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        assert!(matches!(game.join(11), JoinOutcome::Joined { slot: 1 }));
        assert!(matches!(game.join(12), JoinOutcome::Joined { slot: 2 }));
        assert!(matches!(game.join(13), JoinOutcome::Joined { slot: 3 }));
        assert!(matches!(game.join(14), JoinOutcome::GameFull));
    }

    #[test]
    fn start_requires_a_player_and_seats_the_first_occupied_slot() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        game.join(11);
        let outcome = game.start(Instant::now());
        assert!(matches!(outcome, StartOutcome::Started { first_slot: 0 }));
        assert!(game.is_running());
    }

    #[test]
    fn roll_with_no_track_figures_and_non_six_retains_turn_until_third_attempt() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        game.join(11);
        game.start(Instant::now());

        for _ in 0..2 {
            let outcome = game.roll(10, Some(2), ACTIVE, Instant::now());
            assert!(matches!(outcome, RollOutcome::Rolled { next_slot: None, .. }));
        }
        let third = game.roll(10, Some(2), ACTIVE, Instant::now());
        assert!(matches!(third, RollOutcome::Rolled { next_slot: Some(1), .. }));
    }

    #[test]
    fn roll_of_six_lets_a_pocketed_player_move_out() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        game.join(11);
        game.start(Instant::now());

        let outcome = game.roll(10, Some(6), ACTIVE, Instant::now());
        assert!(matches!(outcome, RollOutcome::Rolled { value: 6, next_slot: None }));
    }

    #[test]
    fn leave_resets_tokens_and_advances_turn_when_leaver_held_it() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        game.join(11);
        game.start(Instant::now());
        assert!(matches!(
            game.leave(10, ACTIVE, Instant::now()),
            LeaveOutcome::Left { slot: 0, next_slot: 1 }
        ));
    }

    #[test]
    fn sole_occupant_leaving_closes_the_game() {
        let game = Game::new(0, "ABCDE".into(), 10, Instant::now());
        assert!(matches!(game.leave(10, ACTIVE, Instant::now()), LeaveOutcome::GameClosed));
    }
}
