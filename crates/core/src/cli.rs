//! Command-line argument parsing and the interactive stdin command loop,
//! grounded on spec.md §6.1: the original's positional `main.c` arguments
//! (`server <ip> <port> [logfile] [log_level] [verbose_level]`), parsed by
//! hand rather than with a derive-macro CLI crate — none of the teacher's
//! snapshots reach for one on the server binary itself.

use std::net::SocketAddr;

use anyhow::{bail, Context};
use tokio::sync::mpsc;

pub struct Args {
    pub bind_addr: SocketAddr,
    pub logfile: Option<String>,
    pub log_level: u8,
    pub verbose_level: u8,
}

/// Parses `server <ip> <port> [logfile] [log_level] [verbose_level]` from
/// the process's own argv (`argv[0]` excluded).
pub fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let ip = args.next().context("missing <ip> argument")?;
    let port = args.next().context("missing <port> argument")?;
    let port: u16 = port.parse().context("port must be a number")?;
    let bind_addr: SocketAddr = format!("{ip}:{port}").parse().context("invalid bind address")?;

    let logfile = args.next();
    let log_level = match args.next() {
        Some(s) => s.parse().context("log_level must be a number")?,
        None => 3,
    };
    let verbose_level = match args.next() {
        Some(s) => s.parse().context("verbose_level must be a number")?,
        None => 0,
    };

    Ok(Args { bind_addr, logfile, log_level, verbose_level })
}

/// Admin commands accepted on stdin (spec.md §6.1).
#[derive(Debug)]
pub enum AdminCommand {
    Shutdown,
    ForceRoll(i8),
    SetLog(u8),
    SetVerbose(u8),
}

fn parse_admin_command(line: &str) -> Option<AdminCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "exit" | "shutdown" | "halt" | "close" => Some(AdminCommand::Shutdown),
        // A missing or non-numeric argument still disables the override —
        // `ForceRoll::set` treats any out-of-range value as "off" — rather
        // than dropping the whole command as unrecognized.
        "force_roll" => Some(AdminCommand::ForceRoll(parts.next().and_then(|s| s.parse().ok()).unwrap_or(-1))),
        "set_log" => parts.next()?.parse().ok().map(AdminCommand::SetLog),
        "set_verbose" => parts.next()?.parse().ok().map(AdminCommand::SetVerbose),
        _ => None,
    }
}

/// Reads lines from stdin on a dedicated blocking task — stdin is
/// blocking I/O and must not be polled on the async runtime's reactor
/// thread — and forwards parsed admin commands through an `mpsc` channel.
pub fn spawn_stdin_listener() -> mpsc::UnboundedReceiver<AdminCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::task::spawn_blocking(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_admin_command(&line) {
                if tx.send(command).is_err() {
                    break;
                }
            } else if !line.trim().is_empty() {
                tracing::warn!(%line, "unrecognized admin command");
            }
        }
    });

    rx
}

/// Validates CLI-provided log level bounds before they're handed to
/// `tracing_subscriber` (spec.md §4.7: "mapped from the original's 0-5
/// numeric scale").
pub fn log_level_to_filter(level: u8) -> anyhow::Result<tracing::level_filters::LevelFilter> {
    use tracing::level_filters::LevelFilter;
    Ok(match level {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        5 => LevelFilter::TRACE,
        other => bail!("log_level must be 0-5, got {other}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_optional_arguments() {
        let args = parse_args(
            ["127.0.0.1".to_string(), "9999".to_string(), "server.log".to_string(), "4".to_string()]
                .into_iter(),
        )
        .unwrap();
        assert_eq!(args.bind_addr, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(args.logfile.as_deref(), Some("server.log"));
        assert_eq!(args.log_level, 4);
        assert_eq!(args.verbose_level, 0);
    }

    #[test]
    fn missing_port_is_an_error() {
        assert!(parse_args(["127.0.0.1".to_string()].into_iter()).is_err());
    }

    #[test]
    fn parses_admin_commands() {
        assert!(matches!(parse_admin_command("shutdown"), Some(AdminCommand::Shutdown)));
        assert!(matches!(parse_admin_command("force_roll 4"), Some(AdminCommand::ForceRoll(4))));
        assert!(matches!(parse_admin_command("force_roll"), Some(AdminCommand::ForceRoll(-1))));
        assert!(matches!(parse_admin_command("force_roll abc"), Some(AdminCommand::ForceRoll(-1))));
        assert!(parse_admin_command("nonsense").is_none());
    }

    #[test]
    fn log_level_out_of_range_is_rejected() {
        assert!(log_level_to_filter(6).is_err());
        assert!(log_level_to_filter(0).is_ok());
    }
}
