//! Per-session outbound send queue: a FIFO of frames awaiting
//! acknowledgment, grounded on `examples/original_source/queue.c` (a plain
//! singly-linked FIFO in the original) and spec.md §4.2's stop-and-wait
//! contract. `VecDeque` is the idiomatic Rust stand-in for the original's
//! hand-rolled linked list.

use std::collections::VecDeque;
use std::time::Instant;

use proto::outbound::OutboundMessage;

enum SendState {
    /// Never transmitted.
    Pending,
    /// Transmitted at this instant; eligible for retransmit once stale.
    Sent(Instant),
}

/// One outbound frame: payload text, sequence ID, and send state (spec.md
/// §3 "Outbound frame"). Wire bytes are materialized on demand rather than
/// cached, per the Design Notes' "observable contract is unchanged"
/// allowance for either strategy.
struct OutboundFrame {
    seq: u32,
    payload: String,
    state: SendState,
}

/// Whether the queue head should be (re)transmitted this sweep, and the
/// bytes to send.
pub enum Transmit {
    /// First transmission of this frame.
    First(Vec<u8>),
    /// A retransmission: the frame was sent before and has aged past
    /// `max_packet_age` without an ACK.
    Retry(Vec<u8>),
}

#[derive(Default)]
pub struct SendQueue {
    frames: VecDeque<OutboundFrame>,
    next_seq: u32,
}

impl SendQueue {
    pub fn new() -> Self {
        Self { frames: VecDeque::new(), next_seq: 1 }
    }

    /// Resets the outbound sequence counter to 1 and clears all pending
    /// frames — used on admission and on reconnect (spec.md §4.2
    /// "Reconnect": "the send queue is drained").
    pub fn reset(&mut self) {
        self.frames.clear();
        self.next_seq = 1;
    }

    /// Appends a message with the next outbound sequence ID.
    pub fn push(&mut self, message: &OutboundMessage) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push_back(OutboundFrame {
            seq,
            payload: message.payload(),
            state: SendState::Pending,
        });
        seq
    }

    /// Inspects the head of the queue: materializes and marks it sent if
    /// it has never gone out, retransmits if it's been sent and aged past
    /// `max_packet_age`, or returns `None` if the head is still within its
    /// age budget (spec.md §4.2 "Outbound").
    pub fn poll(&mut self, now: Instant, max_packet_age: std::time::Duration) -> Option<Transmit> {
        let head = self.frames.front_mut()?;
        match head.state {
            SendState::Pending => {
                let bytes = proto::frame::format(head.seq, &head.payload).into_bytes();
                head.state = SendState::Sent(now);
                Some(Transmit::First(bytes))
            }
            SendState::Sent(since) if now.saturating_duration_since(since) >= max_packet_age => {
                let bytes = proto::frame::format(head.seq, &head.payload).into_bytes();
                head.state = SendState::Sent(now);
                Some(Transmit::Retry(bytes))
            }
            SendState::Sent(_) => None,
        }
    }

    /// Pops the head iff its sequence ID equals `ack_seq` (spec.md §4.2:
    /// "An ACK inbound frame whose acknowledged sequence ID equals the
    /// head's sequence ID pops the head and advances. ACKs for non-head
    /// IDs are ignored."). Returns whether anything was popped.
    pub fn acknowledge(&mut self, ack_seq: u32) -> bool {
        if matches!(self.frames.front(), Some(f) if f.seq == ack_seq) {
            self.frames.pop_front();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Invariant check used by tests: strictly increasing and contiguous
    /// starting from the head (spec.md §8 "Universal invariants").
    #[cfg(test)]
    fn is_contiguous(&self) -> bool {
        self.frames
            .iter()
            .zip(self.frames.iter().skip(1))
            .all(|(a, b)| b.seq == a.seq + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn push_assigns_contiguous_seq_ids() {
        let mut q = SendQueue::new();
        let a = q.push(&OutboundMessage::GameFull);
        let b = q.push(&OutboundMessage::GameFull);
        let c = q.push(&OutboundMessage::GameFull);
        assert_eq!((a, b, c), (1, 2, 3));
        assert!(q.is_contiguous());
    }

    #[test]
    fn poll_materializes_once_then_waits_for_age() {
        let mut q = SendQueue::new();
        q.push(&OutboundMessage::GameFull);
        let now = Instant::now();
        assert!(matches!(q.poll(now, Duration::from_millis(500)), Some(Transmit::First(_))));
        assert!(q.poll(now, Duration::from_millis(500)).is_none());
        let later = now + Duration::from_millis(600);
        assert!(matches!(q.poll(later, Duration::from_millis(500)), Some(Transmit::Retry(_))));
    }

    #[test]
    fn acknowledge_only_pops_matching_head() {
        let mut q = SendQueue::new();
        q.push(&OutboundMessage::GameFull);
        q.push(&OutboundMessage::GameRunning);
        assert!(!q.acknowledge(2));
        assert!(q.acknowledge(1));
        assert!(!q.acknowledge(1));
        assert!(q.acknowledge(2));
        assert!(q.is_empty());
    }

    #[test]
    fn reset_clears_queue_and_seq_counter() {
        let mut q = SendQueue::new();
        q.push(&OutboundMessage::GameFull);
        q.push(&OutboundMessage::GameFull);
        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.push(&OutboundMessage::GameFull), 1);
    }
}
