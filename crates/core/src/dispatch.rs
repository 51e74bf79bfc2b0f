//! Inbound frame routing, grounded on
//! `examples/original_source/server.c::process_dgram` (read in full):
//! token/sequence validation already done by the codec and the session's
//! stop-and-wait counter; this module owns the sequence-to-handler
//! mapping and the ACK-before-side-effects rule (spec.md §4.5).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use proto::inbound::InboundCommand;
use proto::outbound::OutboundMessage;
use net::session::{SeqOutcome, Session};
use net::{AdmitOutcome, SessionRegistry};
use tokio::net::UdpSocket;

use crate::config::ServerConfig;
use crate::game::registry::{CreateOutcome, GameRegistry};
use crate::game::{Game, JoinOutcome, LeaveOutcome, MoveOutcome, RollOutcome, StartOutcome};

pub struct Dispatcher {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionRegistry>,
    games: Arc<GameRegistry>,
    socket: Arc<UdpSocket>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        sessions: Arc<SessionRegistry>,
        games: Arc<GameRegistry>,
        socket: Arc<UdpSocket>,
    ) -> Self {
        Dispatcher { config, sessions, games, socket }
    }

    /// Handles one received datagram end to end. Malformed frames are
    /// dropped silently (spec.md §4.1, §7).
    pub async fn handle_datagram(&self, addr: SocketAddr, bytes: &[u8], now: Instant) {
        let Some(frame) = proto::frame::parse(bytes) else { return };
        let Some(command) = InboundCommand::parse(&frame) else { return };

        match command {
            InboundCommand::Connect => self.handle_connect(addr, now).await,
            InboundCommand::Reconnect { token } => self.handle_reconnect(addr, &token, now),
            other => self.handle_session_command(addr, frame.seq, other, now),
        }
    }

    /// spec.md §4.3 "Admit".
    async fn handle_connect(&self, addr: SocketAddr, now: Instant) {
        match self.sessions.admit(addr, now) {
            AdmitOutcome::Admitted(session) => {
                session.enqueue(OutboundMessage::Ack { ack_seq: 1 });
                session.enqueue(OutboundMessage::ReconnectCode { token: session.token.clone() });
            }
            AdmitOutcome::AlreadyConnected(_) => {}
            AdmitOutcome::Full => {
                let _ = self
                    .socket
                    .send_to(proto::frame::format(1, &OutboundMessage::ServerFull.payload()).as_bytes(), addr)
                    .await;
            }
        }
    }

    /// spec.md §4.2 "Reconnect".
    fn handle_reconnect(&self, addr: SocketAddr, token: &str, now: Instant) {
        let Some(session) = self.sessions.lookup_by_token(token) else { return };
        self.sessions.reconnect(&session, addr, now);
        session.enqueue(OutboundMessage::Ack { ack_seq: 1 });

        if let Some(game_index) = session.game_index() {
            if let Some(game) = self.games.lookup_by_index(game_index) {
                if let Some(slot) = game.slot_of(session.index) {
                    self.broadcast(&game, Some(slot), OutboundMessage::ClientReconnect { slot: slot as u8 });
                    self.send_game_state(&game, &session, slot);
                }
            }
        }
    }

    /// spec.md §4.2 "Inbound" + §4.5 "every non-ACK command... is ACKed
    /// before its side effects; ACK itself never triggers an ACK".
    fn handle_session_command(&self, addr: SocketAddr, seq: u32, command: InboundCommand, now: Instant) {
        let Some(session) = self.sessions.lookup_by_addr(addr) else { return };
        session.touch(now);

        match session.check_inbound_seq(seq) {
            SeqOutcome::Future => {}
            SeqOutcome::Duplicate => {
                if !matches!(command, InboundCommand::Ack { .. }) {
                    session.enqueue(OutboundMessage::Ack { ack_seq: seq });
                }
            }
            SeqOutcome::Expected => {
                if let InboundCommand::Ack { ack_seq } = command {
                    session.acknowledge(ack_seq);
                } else {
                    session.enqueue(OutboundMessage::Ack { ack_seq: seq });
                    self.run_command(&session, command, now);
                }
            }
        }
    }

    fn run_command(&self, session: &Arc<Session>, command: InboundCommand, now: Instant) {
        match command {
            InboundCommand::CreateGame => self.create_game(session, now),
            InboundCommand::JoinGame { code } => self.join_game(session, &code),
            InboundCommand::LeaveGame => self.leave_game(session, now),
            InboundCommand::StartGame => self.start_game(session, now),
            InboundCommand::DieRoll => self.roll_die(session, now),
            InboundCommand::FigureMove { figure } => self.figure_move(session, figure, now),
            InboundCommand::Message { text } => self.chat(session, text),
            InboundCommand::Keepalive => {}
            InboundCommand::Close => self.close(session, now),
            InboundCommand::Connect | InboundCommand::Reconnect { .. } | InboundCommand::Ack { .. } => {
                unreachable!("handled before run_command")
            }
        }
    }

    /// spec.md §4.4: the original creates games without re-checking
    /// whether the client already has one (grounded on
    /// `game.c::create_game`'s doc comment: "each client can be present
    /// only in one game" is an invariant the client is trusted to keep,
    /// consistent with the Non-goal of anti-cheat).
    fn create_game(&self, session: &Arc<Session>, now: Instant) {
        match self.games.create(session.index, now) {
            CreateOutcome::Created(game) => {
                session.set_game_index(Some(game.index));
                let lobby_secs = self.config.game_max_lobby.as_secs().saturating_sub(1);
                session.enqueue(OutboundMessage::GameCreated { code: game.code.clone(), lobby_secs });
            }
            CreateOutcome::Full => {}
        }
    }

    /// spec.md §4.4 "Join / Leave". When the session already has a game,
    /// the original skips the code lookup entirely
    /// (`game.c::join_game`'s `if(client->game_index == -1)` guard around
    /// the lookup), which falls through to its "nonexistent" branch; this
    /// reproduces that outcome rather than silently dropping.
    fn join_game(&self, session: &Arc<Session>, code: &str) {
        if session.game_index().is_some() {
            session.enqueue(OutboundMessage::GameNonexistent);
            return;
        }

        let Some(game) = self.games.lookup_by_code(code) else {
            session.enqueue(OutboundMessage::GameNonexistent);
            return;
        };

        match game.join(session.index) {
            JoinOutcome::GameFull => session.enqueue(OutboundMessage::GameFull),
            JoinOutcome::GameRunning => session.enqueue(OutboundMessage::GameRunning),
            JoinOutcome::Joined { slot } => {
                session.set_game_index(Some(game.index));
                self.send_game_state(&game, session, slot);
                self.broadcast(&game, Some(slot), OutboundMessage::ClientJoinedGame { slot: slot as u8 });
            }
        }
    }

    fn leave_game(&self, session: &Arc<Session>, now: Instant) {
        let Some(game_index) = session.game_index() else {
            session.enqueue(OutboundMessage::GameLeft);
            return;
        };
        let Some(game) = self.games.lookup_by_index(game_index) else {
            session.set_game_index(None);
            session.enqueue(OutboundMessage::GameLeft);
            return;
        };

        let active = self.active_flags(&game);
        match game.leave(session.index, active, now) {
            LeaveOutcome::NotInGame => {}
            LeaveOutcome::GameClosed => self.games.remove(game.index),
            LeaveOutcome::Left { slot, next_slot } => {
                let turn_clock = game.seconds_remaining(&self.config);
                self.broadcast(
                    &game,
                    Some(slot),
                    OutboundMessage::ClientLeftGame { slot: slot as u8, next_slot, turn_clock },
                );
            }
        }

        session.set_game_index(None);
        session.enqueue(OutboundMessage::GameLeft);
    }

    fn start_game(&self, session: &Arc<Session>, now: Instant) {
        let Some(game) = self.session_game(session) else { return };
        match game.start(now) {
            StartOutcome::Started { first_slot } => {
                let turn_clock = game.seconds_remaining(&self.config);
                self.broadcast(&game, None, OutboundMessage::GameStarted { first_slot, turn_clock });
            }
            StartOutcome::Recover => {
                if let Some(slot) = game.slot_of(session.index) {
                    self.send_game_state(&game, session, slot);
                }
            }
        }
    }

    fn roll_die(&self, session: &Arc<Session>, now: Instant) {
        let Some(game) = self.session_game(session) else { return };
        let active = self.active_flags(&game);
        let force_roll = self.config.force_roll.get();

        match game.roll(session.index, force_roll, active, now) {
            RollOutcome::Rolled { value, next_slot } => {
                self.broadcast(&game, None, OutboundMessage::RolledDie { value });
                if let Some(next_slot) = next_slot {
                    let turn_clock = game.seconds_remaining(&self.config);
                    self.broadcast(&game, None, OutboundMessage::PlayingIndex { slot: next_slot, turn_clock });
                }
            }
            RollOutcome::Recover => {
                if let Some(slot) = game.slot_of(session.index) {
                    self.send_game_state(&game, session, slot);
                }
            }
        }
    }

    fn figure_move(&self, session: &Arc<Session>, figure: usize, now: Instant) {
        let Some(game) = self.session_game(session) else { return };
        if figure >= crate::game::board::FIGURES_LEN {
            if let Some(slot) = game.slot_of(session.index) {
                self.send_game_state(&game, session, slot);
            }
            return;
        }

        let active = self.active_flags(&game);
        match game.move_figure(session.index, figure, active, now) {
            MoveOutcome::Moved(result) => {
                if let Some((victim, seat)) = result.capture {
                    self.broadcast(&game, None, OutboundMessage::FigureMoved { figure: victim, dest: seat as u8 });
                }
                self.broadcast(&game, None, OutboundMessage::FigureMoved { figure, dest: result.dest as u8 });

                if let Some(positions) = result.game_finished {
                    self.broadcast(&game, None, OutboundMessage::GameFinished { positions });
                    self.clear_game_index(&game);
                    self.games.remove(game.index);
                } else if let Some(next_slot) = result.next_slot {
                    let turn_clock = game.seconds_remaining(&self.config);
                    self.broadcast(&game, None, OutboundMessage::PlayingIndex { slot: next_slot, turn_clock });
                }
            }
            MoveOutcome::Recover => {
                if let Some(slot) = game.slot_of(session.index) {
                    self.send_game_state(&game, session, slot);
                }
            }
        }
    }

    /// Supplemented from the original's `broadcast_message` (§4.10 in
    /// SPEC_FULL.md): rebroadcast to the sender's game with a slot prefix.
    fn chat(&self, session: &Arc<Session>, text: String) {
        let Some(game) = self.session_game(session) else { return };
        let Some(slot) = game.slot_of(session.index) else { return };
        self.broadcast(&game, Some(slot), OutboundMessage::Message { slot: slot as u8, text });
    }

    /// spec.md §4.5 "CLOSE (leave game, remove session)".
    fn close(&self, session: &Arc<Session>, now: Instant) {
        self.leave_game(session, now);
        self.sessions.remove(session.index);
    }

    fn session_game(&self, session: &Session) -> Option<Arc<Game>> {
        let game_index = session.game_index()?;
        self.games.lookup_by_index(game_index)
    }

    /// Clears `game_index` on every occupant, matching the Game lifecycle
    /// invariant (spec.md §3) that a torn-down game leaves no session
    /// pointing at it.
    fn clear_game_index(&self, game: &Game) {
        for occupant in game.occupied_slots().into_iter().flatten() {
            if let Some(session) = self.sessions.lookup_by_index(occupant) {
                session.set_game_index(None);
            }
        }
    }

    fn active_flags(&self, game: &Game) -> [bool; 4] {
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

    fn slot_flags(&self, game: &Game) -> [u8; 4] {
        let mut flags = [0u8; 4];
        for (slot, occupant) in game.occupied_slots().into_iter().enumerate() {
            flags[slot] = match occupant.and_then(|index| self.sessions.lookup_by_index(index)) {
                Some(session) if session.is_active() => 1,
                Some(_) => 2,
                None => 0,
            };
        }
        flags
    }

    fn send_game_state(&self, game: &Game, session: &Session, slot: usize) {
        let flags = self.slot_flags(game);
        let frame = game.snapshot(slot, flags, &self.config);
        session.enqueue(OutboundMessage::GameState(frame));
    }

    /// Broadcasts to every occupied slot except `skip_slot` (or every slot
    /// when `skip_slot` is `None`), per spec.md §5 "Broadcast skips
    /// re-locking the originating session."
    fn broadcast(&self, game: &Game, skip_slot: Option<usize>, message: OutboundMessage) {
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
