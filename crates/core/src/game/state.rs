//! Per-match board state, grounded on `game_state_t` in
//! `examples/original_source/game.h`.

use crate::game::board::{self, FIELDS_LEN, FIGURES_LEN};

/// Sentinel for `playing` when no one has the turn yet (lobby), matching
/// the original's `playing = 100`.
pub const NO_PLAYER: u8 = proto::outbound::NO_PLAYER;

#[derive(Debug, Clone)]
pub struct GameState {
    /// Field index of each of the 16 figures (four per player).
    pub figures: [u8; FIGURES_LEN],
    /// Reverse map: field -> occupying figure index, or -1 if empty.
    pub fields: [i8; FIELDS_LEN],
    /// Current turn slot, or `NO_PLAYER`.
    pub playing: u8,
    /// -1 if not yet rolled this turn, else 1-6.
    pub playing_rolled: i8,
    /// Consecutive roll attempts this turn, toward the 3-attempt rule.
    pub playing_rolled_times: u8,
    /// Finish order: standings slot -> player slot, -1 until filled.
    pub finished: [i8; 4],
}

impl GameState {
    pub fn new() -> Self {
        let mut figures = [0u8; FIGURES_LEN];
        let mut fields = [-1i8; FIELDS_LEN];
        for figure in 0..FIGURES_LEN {
            let seat = board::pocket_seat(figure) as u8;
            figures[figure] = seat;
            fields[seat as usize] = figure as i8;
        }

        GameState {
            figures,
            fields,
            playing: NO_PLAYER,
            playing_rolled: -1,
            playing_rolled_times: 0,
            finished: [-1; 4],
        }
    }

    pub fn has_figures_on_track(&self, player: usize) -> bool {
        (4 * player..4 * player + 4).any(|f| (self.figures[f] as usize) < board::TRACK_LEN)
    }

    /// Whether `player` has any legal move available with the current
    /// roll (`can_player_play` in the original).
    pub fn can_player_play(&self, player: usize, roll: u8) -> bool {
        (4 * player..4 * player + 4).any(|figure| self.figure_destination(figure, roll).is_some())
    }

    pub fn figure_destination(&self, figure: usize, roll: u8) -> Option<usize> {
        let player = board::player_of(figure);
        let field = self.figures[figure] as usize;
        let dest = board::destination(player, field, roll)?;
        board::is_legal_destination(&self.fields, player, dest).then_some(dest)
    }

    /// Moves `figure` to `dest`, capturing and returning the victim's
    /// figure index and pocket seat if `dest` was occupied by an
    /// opponent.
    pub fn apply_move(&mut self, figure: usize, dest: usize) -> Option<(usize, usize)> {
        let origin = self.figures[figure] as usize;
        self.fields[origin] = -1;

        let capture = match self.fields[dest] {
            -1 => None,
            victim => {
                let victim = victim as usize;
                let seat = board::pocket_seat(victim);
                self.figures[victim] = seat as u8;
                self.fields[seat] = victim as i8;
                Some((victim, seat))
            }
        };

        self.figures[figure] = dest as u8;
        self.fields[dest] = figure as i8;
        capture
    }

    pub fn has_all_figures_at_home(&self, player: usize) -> bool {
        let home = board::home_base(player);
        (4 * player..4 * player + 4).all(|f| (self.figures[f] as usize) >= home && (self.figures[f] as usize) < home + board::HOME_LEN)
    }

    /// Records `player` in the next empty standings slot, if not already
    /// recorded.
    pub fn record_finish(&mut self, player: usize) {
        if self.finished.contains(&(player as i8)) {
            return;
        }
        if let Some(slot) = self.finished.iter_mut().find(|s| **s == -1) {
            *slot = player as i8;
        }
    }

    pub fn finish_position(&self, player: usize) -> i8 {
        self.finished
            .iter()
            .position(|&p| p == player as i8)
            .map_or(-1, |pos| pos as i8)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_every_figure_in_its_pocket_seat() {
        let state = GameState::new();
        for figure in 0..FIGURES_LEN {
            assert_eq!(state.figures[figure] as usize, board::pocket_seat(figure));
            assert_eq!(state.fields[board::pocket_seat(figure)], figure as i8);
        }
    }

    #[test]
    fn apply_move_captures_opponent_and_frees_origin() {
        let mut state = GameState::new();
        state.figures[0] = 9;
        state.fields[board::pocket_seat(0)] = -1;
        state.fields[9] = 0;

        state.figures[4] = 10;
        state.fields[board::pocket_seat(4)] = -1;
        state.fields[10] = 4;

        let capture = state.apply_move(0, 10);
        assert_eq!(capture, Some((4, board::pocket_seat(4))));
        assert_eq!(state.fields[9], -1);
        assert_eq!(state.fields[10], 0);
        assert_eq!(state.figures[4] as usize, board::pocket_seat(4));
    }

    #[test]
    fn record_finish_fills_next_empty_slot_once() {
        let mut state = GameState::new();
        state.record_finish(2);
        state.record_finish(2);
        state.record_finish(0);
        assert_eq!(state.finished, [2, 0, -1, -1]);
        assert_eq!(state.finish_position(2), 0);
        assert_eq!(state.finish_position(0), 1);
        assert_eq!(state.finish_position(3), -1);
    }
}
