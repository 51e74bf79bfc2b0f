//! The games table, mirroring `ludo_net::SessionRegistry`'s shape (bounded
//! slots plus a secondary index), grounded on spec.md §4.3/§4.4 and
//! `examples/original_source/game.c::create_game`/`get_game_by_code`.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use util::rng::generate_code;

use super::Game;

pub enum CreateOutcome {
    Created(Arc<Game>),
    Full,
}

pub struct GameRegistry {
    slots: Vec<RwLock<Option<Arc<Game>>>>,
    by_code: DashMap<String, usize>,
    game_code_len: usize,
}

impl GameRegistry {
    pub fn new(capacity: usize, game_code_len: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || RwLock::new(None));
        GameRegistry { slots, by_code: DashMap::new(), game_code_len }
    }

    pub fn lookup_by_code(&self, code: &str) -> Option<Arc<Game>> {
        let index = *self.by_code.get(code)?;
        self.lookup_by_index(index)
    }

    pub fn lookup_by_index(&self, index: usize) -> Option<Arc<Game>> {
        self.slots.get(index)?.read().clone()
    }

    /// spec.md §4.4 "Join / Leave" creation path: allocates a slot and a
    /// unique short alphanumeric code (collision-retried up to 100 times,
    /// grounded on `generate_game_code`).
    pub fn create(&self, creator_session: usize, now: Instant) -> CreateOutcome {
        let Some(index) = self.slots.iter().position(|slot| slot.read().is_none()) else {
            return CreateOutcome::Full;
        };

        let mut slot = self.slots[index].write();
        if slot.is_some() {
            drop(slot);
            return self.create(creator_session, now);
        }

        let Some(code) = generate_code(self.game_code_len, |candidate| self.by_code.contains_key(candidate)) else {
            return CreateOutcome::Full;
        };

        let game = Arc::new(Game::new(index, code.clone(), creator_session, now));
        *slot = Some(game.clone());
        drop(slot);

        self.by_code.insert(code, index);
        CreateOutcome::Created(game)
    }

    pub fn remove(&self, index: usize) {
        let Some(game) = self.lookup_by_index(index) else { return };
        let mut slot = self.slots[index].write();
        *slot = None;
        drop(slot);
        self.by_code.remove(&game.code);
    }

    pub fn occupied(&self) -> Vec<Arc<Game>> {
        self.slots.iter().filter_map(|slot| slot.read().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_allocates_unique_codes_until_full() {
        let registry = GameRegistry::new(2, 5);
        let CreateOutcome::Created(first) = registry.create(1, Instant::now()) else {
            panic!("expected creation")
        };
        let CreateOutcome::Created(second) = registry.create(2, Instant::now()) else {
            panic!("expected creation")
        };
        assert_ne!(first.code, second.code);
        assert!(matches!(registry.create(3, Instant::now()), CreateOutcome::Full));
    }

    #[test]
    fn remove_frees_both_slot_and_code_index() {
        let registry = GameRegistry::new(1, 5);
        let CreateOutcome::Created(game) = registry.create(1, Instant::now()) else {
            panic!("expected creation")
        };
        let code = game.code.clone();
        registry.remove(game.index);
        assert!(registry.lookup_by_code(&code).is_none());
        assert!(matches!(registry.create(2, Instant::now()), CreateOutcome::Created(_)));
    }
}
