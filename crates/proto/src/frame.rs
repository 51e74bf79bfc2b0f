//! Raw frame parsing and formatting, grounded on `server.c::process_dgram`'s
//! `strtok` splitting of `<token>;<seq>;<command>;...`.

use crate::constants::APP_TOKEN;

/// A parsed inbound frame: token already verified, sequence ID already
/// validated as a positive integer. Command-specific argument parsing
/// happens in `inbound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub command: String,
    pub args: Vec<String>,
}

impl Frame {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Parses a raw datagram payload into a `Frame`, or `None` if the token
/// doesn't match, the sequence ID doesn't parse as a positive integer, or
/// the frame is missing its command field. Matches spec.md §4.1: "the
/// codec validates token equality and that the sequence ID parses as a
/// positive integer; otherwise the frame is silently dropped."
pub fn parse(bytes: &[u8]) -> Option<Frame> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut fields = text.trim_end_matches(['\r', '\n']).split(';');

    let token = fields.next()?;
    if token != APP_TOKEN {
        return None;
    }

    let seq: u32 = fields.next()?.parse().ok()?;
    if seq == 0 {
        return None;
    }

    let command = fields.next()?.to_string();
    let args = fields.map(str::to_string).collect();

    Some(Frame { seq, command, args })
}

/// Formats an outbound frame's wire bytes: `<token>;<seq>;<payload>`.
pub fn format(seq: u32, payload: &str) -> String {
    format!("{APP_TOKEN};{seq};{payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_frame() {
        let frame = parse(b"LUDO;1;CONNECT").unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.command, "CONNECT");
        assert!(frame.args.is_empty());
    }

    #[test]
    fn parses_frame_with_args() {
        let frame = parse(b"LUDO;7;JOIN_GAME;AB12C").unwrap();
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.command, "JOIN_GAME");
        assert_eq!(frame.args, vec!["AB12C".to_string()]);
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(parse(b"NOPE;1;CONNECT").is_none());
    }

    #[test]
    fn rejects_non_positive_seq() {
        assert!(parse(b"LUDO;0;CONNECT").is_none());
        assert!(parse(b"LUDO;-1;CONNECT").is_none());
        assert!(parse(b"LUDO;abc;CONNECT").is_none());
    }

    #[test]
    fn rejects_missing_command() {
        assert!(parse(b"LUDO;1").is_none());
    }

    #[test]
    fn format_round_trips_through_parse() {
        let wire = format(3, "ACK;1");
        let frame = parse(wire.as_bytes()).unwrap();
        assert_eq!(frame.seq, 3);
        assert_eq!(frame.command, "ACK");
        assert_eq!(frame.args, vec!["1".to_string()]);
    }
}
