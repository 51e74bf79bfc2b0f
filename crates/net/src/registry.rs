//! The session table: a bounded sparse array of slots plus address/token
//! indices, grounded on spec.md §4.3 and Design Notes §9 ("Global
//! tables... encapsulate them as an explicit Registry value").

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use util::rng::generate_code;

use crate::session::Session;

pub enum AdmitOutcome {
    /// A fresh session was allocated at this slot.
    Admitted(Arc<Session>),
    /// `addr` already names a live session; the reliability layer's
    /// retransmit semantics take over, per spec.md §4.3 "Admit": "if addr
    /// matches an existing session, no-op".
    AlreadyConnected(Arc<Session>),
    /// The table has no free slot.
    Full,
}

pub struct SessionRegistry {
    slots: Vec<RwLock<Option<Arc<Session>>>>,
    by_addr: DashMap<SocketAddr, usize>,
    by_token: DashMap<String, usize>,
    reconnect_code_len: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize, reconnect_code_len: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || RwLock::new(None));
        SessionRegistry {
            slots,
            by_addr: DashMap::new(),
            by_token: DashMap::new(),
            reconnect_code_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn lookup_by_addr(&self, addr: SocketAddr) -> Option<Arc<Session>> {
        let index = *self.by_addr.get(&addr)?;
        self.lookup_by_index(index)
    }

    pub fn lookup_by_index(&self, index: usize) -> Option<Arc<Session>> {
        self.slots.get(index)?.read().clone()
    }

    pub fn lookup_by_token(&self, token: &str) -> Option<Arc<Session>> {
        let index = *self.by_token.get(token)?;
        self.lookup_by_index(index)
    }

    /// spec.md §4.3 "Admit": existing session at `addr` is a no-op, a full
    /// table yields `Full`, otherwise a slot is allocated, a reconnect
    /// token generated (retrying on collision up to 100 times, per
    /// `ludo_util::rng::generate_code`), and the token index updated
    /// before the caller enqueues `RECONNECT_CODE` — satisfying the Design
    /// Notes' resolution of the token-visibility open question.
    pub fn admit(&self, addr: SocketAddr, now: Instant) -> AdmitOutcome {
        if let Some(existing) = self.lookup_by_addr(addr) {
            return AdmitOutcome::AlreadyConnected(existing);
        }

        let Some(index) = self.slots.iter().position(|slot| slot.read().is_none()) else {
            return AdmitOutcome::Full;
        };

        let mut slot = self.slots[index].write();
        if slot.is_some() {
            // Lost a race between the scan above and taking the write lock.
            drop(slot);
            return self.admit(addr, now);
        }

        let token = generate_code(self.reconnect_code_len, |candidate| {
            self.by_token.contains_key(candidate)
        });
        let Some(token) = token else {
            return AdmitOutcome::Full;
        };

        let session = Arc::new(Session::new(index, token.clone(), addr, now));
        *slot = Some(session.clone());
        drop(slot);

        self.by_addr.insert(addr, index);
        self.by_token.insert(token, index);

        AdmitOutcome::Admitted(session)
    }

    /// spec.md §4.2 "Reconnect": rebind `session` to `new_addr`, refresh
    /// the address index, and reset both sequence counters and the send
    /// queue.
    pub fn reconnect(&self, session: &Arc<Session>, new_addr: SocketAddr, now: Instant) {
        let old_addr = session.addr();
        if old_addr != new_addr {
            self.by_addr.remove(&old_addr);
            self.by_addr.insert(new_addr, session.index);
        }
        session.reset_for_admission(now, new_addr);
    }

    /// Unlinks the slot and both indices. Does not touch the session's
    /// game membership — callers must `leave_game` first if needed.
    pub fn remove(&self, index: usize) {
        let Some(session) = self.lookup_by_index(index) else { return };
        let mut slot = self.slots[index].write();
        *slot = None;
        drop(slot);
        self.by_addr.remove(&session.addr());
        self.by_token.remove(&session.token);
    }

    /// All currently occupied slots, for the watchdog sweep.
    pub fn occupied(&self) -> Vec<Arc<Session>> {
        self.slots.iter().filter_map(|slot| slot.read().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn admit_allocates_then_reports_full() {
        let registry = SessionRegistry::new(2, 4);
        assert!(matches!(registry.admit(addr(1), Instant::now()), AdmitOutcome::Admitted(_)));
        assert!(matches!(registry.admit(addr(2), Instant::now()), AdmitOutcome::Admitted(_)));
        assert!(matches!(registry.admit(addr(3), Instant::now()), AdmitOutcome::Full));
    }

    #[test]
    fn admit_is_noop_for_known_address() {
        let registry = SessionRegistry::new(2, 4);
        let AdmitOutcome::Admitted(first) = registry.admit(addr(1), Instant::now()) else {
            panic!("expected admission")
        };
        let AdmitOutcome::AlreadyConnected(again) = registry.admit(addr(1), Instant::now()) else {
            panic!("expected no-op")
        };
        assert_eq!(first.index, again.index);
    }

    #[test]
    fn remove_frees_the_slot_for_reuse() {
        let registry = SessionRegistry::new(1, 4);
        let AdmitOutcome::Admitted(session) = registry.admit(addr(1), Instant::now()) else {
            panic!("expected admission")
        };
        registry.remove(session.index);
        assert!(registry.lookup_by_addr(addr(1)).is_none());
        assert!(matches!(registry.admit(addr(2), Instant::now()), AdmitOutcome::Admitted(_)));
    }

    #[test]
    fn reconnect_rebinds_address_index() {
        let registry = SessionRegistry::new(1, 4);
        let AdmitOutcome::Admitted(session) = registry.admit(addr(1), Instant::now()) else {
            panic!("expected admission")
        };
        let token = session.token.clone();
        registry.reconnect(&session, addr(2), Instant::now());

        assert!(registry.lookup_by_addr(addr(1)).is_none());
        assert!(registry.lookup_by_addr(addr(2)).is_some());
        assert_eq!(registry.lookup_by_token(&token).unwrap().index, session.index);
    }
}
