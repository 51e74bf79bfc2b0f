//! Client→server command vocabulary (spec.md §4.5, §6).

use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    Connect,
    Reconnect { token: String },
    CreateGame,
    JoinGame { code: String },
    LeaveGame,
    StartGame,
    DieRoll,
    FigureMove { figure: usize },
    Message { text: String },
    Keepalive,
    Close,
    Ack { ack_seq: u32 },
}

impl InboundCommand {
    /// Parses a command out of a frame's command name and args. Returns
    /// `None` for an unrecognized command or malformed arguments — both
    /// are "malformed frame", silently dropped per spec.md §7.
    pub fn parse(frame: &Frame) -> Option<InboundCommand> {
        match frame.command.as_str() {
            "CONNECT" => Some(InboundCommand::Connect),
            "RECONNECT" => Some(InboundCommand::Reconnect {
                token: frame.arg(0)?.to_string(),
            }),
            "CREATE_GAME" => Some(InboundCommand::CreateGame),
            "JOIN_GAME" => Some(InboundCommand::JoinGame {
                code: frame.arg(0)?.to_string(),
            }),
            "LEAVE_GAME" => Some(InboundCommand::LeaveGame),
            "START_GAME" => Some(InboundCommand::StartGame),
            "DIE_ROLL" => Some(InboundCommand::DieRoll),
            "FIGURE_MOVE" => Some(InboundCommand::FigureMove {
                figure: frame.arg(0)?.parse().ok()?,
            }),
            "MESSAGE" => Some(InboundCommand::Message {
                text: frame.arg(0)?.to_string(),
            }),
            "KEEPALIVE" => Some(InboundCommand::Keepalive),
            "CLOSE" => Some(InboundCommand::Close),
            "ACK" => Some(InboundCommand::Ack {
                ack_seq: frame.arg(0)?.parse().ok()?,
            }),
            _ => None,
        }
    }

    /// Admission frames bypass the expected-sequence check (spec.md §4.2
    /// "Handshake").
    pub fn bypasses_sequence_check(&self) -> bool {
        matches!(self, InboundCommand::Connect | InboundCommand::Reconnect { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(command: &str, args: &[&str]) -> Frame {
        Frame {
            seq: 1,
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn parses_each_known_command() {
        assert_eq!(InboundCommand::parse(&frame("CONNECT", &[])), Some(InboundCommand::Connect));
        assert_eq!(
            InboundCommand::parse(&frame("RECONNECT", &["abcd"])),
            Some(InboundCommand::Reconnect { token: "abcd".into() })
        );
        assert_eq!(
            InboundCommand::parse(&frame("FIGURE_MOVE", &["4"])),
            Some(InboundCommand::FigureMove { figure: 4 })
        );
        assert_eq!(
            InboundCommand::parse(&frame("ACK", &["7"])),
            Some(InboundCommand::Ack { ack_seq: 7 })
        );
    }

    #[test]
    fn rejects_unknown_command() {
        assert_eq!(InboundCommand::parse(&frame("NOT_A_COMMAND", &[])), None);
    }

    #[test]
    fn rejects_missing_required_arg() {
        assert_eq!(InboundCommand::parse(&frame("JOIN_GAME", &[])), None);
        assert_eq!(InboundCommand::parse(&frame("FIGURE_MOVE", &["not-a-number"])), None);
    }

    #[test]
    fn only_connect_and_reconnect_bypass_sequence_check() {
        assert!(InboundCommand::Connect.bypasses_sequence_check());
        assert!(InboundCommand::Reconnect { token: "x".into() }.bypasses_sequence_check());
        assert!(!InboundCommand::Keepalive.bypasses_sequence_check());
    }
}
