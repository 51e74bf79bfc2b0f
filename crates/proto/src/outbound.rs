//! Server→client command vocabulary (spec.md §4.4 "GAME_STATE frame",
//! §6). Rendering is pure string formatting; nothing here knows about
//! sockets, queues, or sequence IDs — those are added by `ludo-net` at
//! materialization time (spec.md §9 "Payload materialization").

/// Sentinel for `GameStateFrame::turn_slot` and `GAME_STARTED`'s slot
/// field when no player is currently taking a turn, matching the
/// original's `playing = 100`.
pub const NO_PLAYER: u8 = 100;

/// The 26-field `GAME_STATE` snapshot (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct GameStateFrame {
    pub code: String,
    /// `false` = lobby, `true` = running.
    pub running: bool,
    /// Per-slot activity: 0 empty, 1 active, 2 inactive.
    pub slot_flags: [u8; 4],
    /// Position (field index 0-71) of each of the 16 figures.
    pub positions: [u8; 16],
    /// Current turn slot, or `NO_PLAYER`.
    pub turn_slot: u8,
    /// The recipient's own slot.
    pub own_slot: u8,
    /// Seconds remaining before the current lobby/turn timeout.
    pub seconds_remaining: u64,
    /// Current roll, or -1 if unrolled this turn.
    pub roll: i8,
}

#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Ack { ack_seq: u32 },
    ReconnectCode { token: String },
    GameCreated { code: String, lobby_secs: u64 },
    GameState(GameStateFrame),
    ClientJoinedGame { slot: u8 },
    ClientLeftGame { slot: u8, next_slot: u8, turn_clock: u64 },
    ClientReconnect { slot: u8 },
    ClientTimeout { slot: u8, next_slot: u8, turn_clock: u64 },
    GameStarted { first_slot: u8, turn_clock: u64 },
    RolledDie { value: u8 },
    PlayingIndex { slot: u8, turn_clock: u64 },
    FigureMoved { figure: usize, dest: u8 },
    GameFinished { positions: [i8; 4] },
    GameFull,
    GameRunning,
    GameNonexistent,
    GameLeft,
    ServerFull,
    ServerShutdown,
    /// Supplemented from the original's `broadcast_message`
    /// (`examples/original_source/server.c`); the sender's slot is
    /// included so recipients can attribute the line (see DESIGN.md).
    Message { slot: u8, text: String },
}

impl OutboundMessage {
    /// Renders the payload (everything after `<token>;<seq>;`).
    pub fn payload(&self) -> String {
        match self {
            OutboundMessage::Ack { ack_seq } => format!("ACK;{ack_seq}"),
            OutboundMessage::ReconnectCode { token } => format!("RECONNECT_CODE;{token}"),
            OutboundMessage::GameCreated { code, lobby_secs } => {
                format!("GAME_CREATED;{code};{lobby_secs}")
            }
            OutboundMessage::GameState(frame) => render_game_state(frame),
            OutboundMessage::ClientJoinedGame { slot } => format!("CLIENT_JOINED_GAME;{slot}"),
            OutboundMessage::ClientLeftGame { slot, next_slot, turn_clock } => {
                format!("CLIENT_LEFT_GAME;{slot};{next_slot};{turn_clock}")
            }
            OutboundMessage::ClientReconnect { slot } => format!("CLIENT_RECONNECT;{slot}"),
            OutboundMessage::ClientTimeout { slot, next_slot, turn_clock } => {
                format!("CLIENT_TIMEOUT;{slot};{next_slot};{turn_clock}")
            }
            OutboundMessage::GameStarted { first_slot, turn_clock } => {
                format!("GAME_STARTED;{first_slot};{turn_clock}")
            }
            OutboundMessage::RolledDie { value } => format!("ROLLED_DIE;{value}"),
            OutboundMessage::PlayingIndex { slot, turn_clock } => {
                format!("PLAYING_INDEX;{slot};{turn_clock}")
            }
            OutboundMessage::FigureMoved { figure, dest } => format!("FIGURE_MOVED;{figure};{dest}"),
            OutboundMessage::GameFinished { positions } => format!(
                "GAME_FINISHED;{};{};{};{}",
                positions[0], positions[1], positions[2], positions[3]
            ),
            OutboundMessage::GameFull => "GAME_FULL".to_string(),
            OutboundMessage::GameRunning => "GAME_RUNNING".to_string(),
            OutboundMessage::GameNonexistent => "GAME_NONEXISTENT".to_string(),
            OutboundMessage::GameLeft => "GAME_LEFT".to_string(),
            OutboundMessage::ServerFull => "SERVER_FULL".to_string(),
            OutboundMessage::ServerShutdown => "SERVER_SHUTDOWN".to_string(),
            OutboundMessage::Message { slot, text } => format!("MESSAGE;{slot};{text}"),
        }
    }

    /// Whether this message is sent outside the stop-and-wait discipline
    /// (spec.md §4.2 "Server-initiated unreliable frames"): `SERVER_FULL`
    /// (capacity rejection, before a session even exists) and
    /// `SERVER_SHUTDOWN` (the server is exiting, there's no one left to
    /// retransmit to).
    pub fn is_unreliable(&self) -> bool {
        matches!(self, OutboundMessage::ServerFull | OutboundMessage::ServerShutdown)
    }
}

fn render_game_state(frame: &GameStateFrame) -> String {
    let mut out = String::from("GAME_STATE;");
    out.push_str(&frame.code);
    out.push(';');
    out.push_str(if frame.running { "1" } else { "0" });
    for flag in frame.slot_flags {
        out.push(';');
        out.push_str(&flag.to_string());
    }
    for pos in frame.positions {
        out.push(';');
        out.push_str(&pos.to_string());
    }
    out.push(';');
    out.push_str(&frame.turn_slot.to_string());
    out.push(';');
    out.push_str(&frame.own_slot.to_string());
    out.push(';');
    out.push_str(&frame.seconds_remaining.to_string());
    out.push(';');
    out.push_str(&frame.roll.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_renders_26_semicolon_separated_fields() {
        let frame = GameStateFrame {
            code: "AB1CD".to_string(),
            running: false,
            slot_flags: [1, 1, 0, 0],
            positions: [56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71],
            turn_slot: NO_PLAYER,
            own_slot: 1,
            seconds_remaining: 35998,
            roll: -1,
        };
        let payload = render_game_state(&frame);
        assert_eq!(payload.split(';').count(), 26);
        assert!(payload.starts_with("GAME_STATE;AB1CD;0;1;1;0;0;56;57;"));
        assert!(payload.ends_with(";100;1;35998;-1"));
    }

    #[test]
    fn simple_messages_render_without_trailing_semicolon() {
        assert_eq!(OutboundMessage::GameFull.payload(), "GAME_FULL");
        assert_eq!(OutboundMessage::Ack { ack_seq: 1 }.payload(), "ACK;1");
    }
}
