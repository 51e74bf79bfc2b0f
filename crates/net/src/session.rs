//! A single player's connection state, grounded on `client_t` in
//! `examples/original_source/client.h`. The redesign note in spec.md §9
//! ("locks returned from lookups") is taken up here: instead of handing
//! out a locked guard, callers pass a closure to `Session::locked`, and
//! release is guaranteed by `parking_lot::Mutex`'s drop-on-scope-exit.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use proto::outbound::OutboundMessage;

use crate::queue::{SendQueue, Transmit};

/// Outcome of validating an inbound sequence ID against a session's
/// expected counter (spec.md §4.2 "Inbound").
pub enum SeqOutcome {
    /// Matches `pkt_recv_seq_id`; the handler should run and an ACK for
    /// this sequence ID should be sent. The expected counter has already
    /// been advanced.
    Expected,
    /// Strictly less than expected: a duplicate. The handler must not
    /// run; the caller should re-emit an ACK for `seq`.
    Duplicate,
    /// Strictly greater than expected: dropped, the client will retransmit.
    Future,
}

struct SessionState {
    addr: SocketAddr,
    active: bool,
    last_activity: Instant,
    recv_seq: u32,
    queue: SendQueue,
    game_index: Option<usize>,
}

/// One admitted player endpoint. `index` and `token` are stable for the
/// life of the session; everything else lives behind the single mutex
/// (spec.md §3: "a per-session mutual-exclusion guard").
pub struct Session {
    pub index: usize,
    pub token: String,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(index: usize, token: String, addr: SocketAddr, now: Instant) -> Self {
        Session {
            index,
            token,
            state: Mutex::new(SessionState {
                addr,
                active: true,
                last_activity: now,
                recv_seq: 1,
                queue: SendQueue::new(),
                game_index: None,
            }),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.state.lock().addr
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn game_index(&self) -> Option<usize> {
        self.state.lock().game_index
    }

    pub fn set_game_index(&self, game_index: Option<usize>) {
        self.state.lock().game_index = game_index;
    }

    pub fn touch(&self, now: Instant) {
        self.state.lock().last_activity = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.lock().last_activity)
    }

    /// Marks the session inactive and restarts the grace-period clock
    /// (spec.md §4.3 "MarkInactive").
    pub fn mark_inactive(&self, now: Instant) {
        let mut state = self.state.lock();
        state.active = false;
        state.last_activity = now;
    }

    /// Validates an inbound data-frame sequence ID and, if it matches,
    /// advances the expected counter (spec.md §4.2 "Inbound").
    pub fn check_inbound_seq(&self, seq: u32) -> SeqOutcome {
        let mut state = self.state.lock();
        match seq.cmp(&state.recv_seq) {
            std::cmp::Ordering::Equal => {
                state.recv_seq += 1;
                SeqOutcome::Expected
            }
            std::cmp::Ordering::Less => SeqOutcome::Duplicate,
            std::cmp::Ordering::Greater => SeqOutcome::Future,
        }
    }

    /// Appends a message to the outbound queue, returning its sequence ID.
    pub fn enqueue(&self, message: OutboundMessage) -> u32 {
        self.state.lock().queue.push(&message)
    }

    /// Called by the sender task once per sweep.
    pub fn poll_send(&self, now: Instant, max_packet_age: Duration) -> Option<Transmit> {
        self.state.lock().queue.poll(now, max_packet_age)
    }

    /// An inbound `ACK` frame for this session.
    pub fn acknowledge(&self, ack_seq: u32) -> bool {
        self.state.lock().queue.acknowledge(ack_seq)
    }

    /// Full admission reset: sequence counters to 1, queue cleared — used
    /// both for a brand-new `CONNECT` and for `RECONNECT` (spec.md §4.2
    /// "Handshake", "Reconnect").
    pub fn reset_for_admission(&self, now: Instant, addr: SocketAddr) {
        let mut state = self.state.lock();
        state.addr = addr;
        state.active = true;
        state.last_activity = now;
        state.recv_seq = 1;
        state.queue.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn inbound_seq_expected_then_duplicate_then_future() {
        let session = Session::new(0, "tok".into(), addr(), Instant::now());
        assert!(matches!(session.check_inbound_seq(1), SeqOutcome::Expected));
        assert!(matches!(session.check_inbound_seq(1), SeqOutcome::Duplicate));
        assert!(matches!(session.check_inbound_seq(5), SeqOutcome::Future));
        assert!(matches!(session.check_inbound_seq(2), SeqOutcome::Expected));
    }

    #[test]
    fn reconnect_resets_counters_and_rebinds_address() {
        let session = Session::new(0, "tok".into(), addr(), Instant::now());
        session.enqueue(OutboundMessage::GameFull);
        session.check_inbound_seq(1);

        let new_addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        session.reset_for_admission(Instant::now(), new_addr);

        assert_eq!(session.addr(), new_addr);
        assert!(matches!(session.check_inbound_seq(1), SeqOutcome::Expected));
        assert_eq!(session.enqueue(OutboundMessage::GameFull), 1);
    }
}
