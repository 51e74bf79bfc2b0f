//! The three long-running tasks that drive the server, grounded on
//! `core/src/instance.rs::Instance::run`/`net_receiver`'s
//! `tokio::select!`-over-`CancellationToken` shutdown pattern.

use std::sync::Arc;
use std::time::Instant;

use net::SessionRegistry;
use proto::constants::MAX_DGRAM_SIZE;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::AdminCommand;
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::game::registry::GameRegistry;
use crate::watchdog::Watchdog;

/// Waits for Ctrl+C, an `exit`/`shutdown`/`halt`/`close` admin command, or
/// the token being cancelled elsewhere, matching `signal_listener` in
/// `core/src/instance.rs` extended with the admin channel from §6.1.
async fn signal_listener(
    config: Arc<ServerConfig>,
    mut admin_rx: mpsc::UnboundedReceiver<AdminCommand>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::signal::ctrl_c() => return,
            command = admin_rx.recv() => match command {
                None | Some(AdminCommand::Shutdown) => return,
                Some(AdminCommand::ForceRoll(value)) => config.force_roll.set(value),
                Some(AdminCommand::SetLog(level)) => tracing::info!(level, "log level change requested"),
                Some(AdminCommand::SetVerbose(level)) => tracing::info!(level, "verbosity change requested"),
            },
        }
    }
}

/// Receives datagrams and hands each one to the dispatcher. Runs until
/// cancelled.
async fn receiver_task(socket: Arc<UdpSocket>, dispatcher: Arc<Dispatcher>, token: CancellationToken) {
    let mut buf = vec![0u8; MAX_DGRAM_SIZE];

    loop {
        let (len, addr) = tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!("failed to receive datagram: {err}");
                    continue;
                }
            },
            _ = token.cancelled() => break,
        };

        dispatcher.handle_datagram(addr, &buf[..len], Instant::now()).await;
    }
}

/// Sweeps every session's send queue once per tick, materializing and
/// transmitting the head frame (spec.md §4.2 "Outbound").
async fn sender_task(
    socket: Arc<UdpSocket>,
    sessions: Arc<SessionRegistry>,
    config: Arc<ServerConfig>,
    token: CancellationToken,
) {
    let mut ticks = tokio::time::interval(config.max_packet_age);

    loop {
        tokio::select! {
            _ = ticks.tick() => (),
            _ = token.cancelled() => break,
        }

        let now = Instant::now();
        for session in sessions.occupied() {
            let Some(transmit) = session.poll_send(now, config.max_packet_age) else { continue };
            let bytes = match &transmit {
                net::Transmit::First(bytes) | net::Transmit::Retry(bytes) => bytes,
            };
            if let Err(err) = socket.send_to(bytes, session.addr()).await {
                tracing::warn!(session = session.index, "failed to send datagram: {err}");
            }
        }
    }
}

/// Runs the liveness sweep once per `watchdog_interval`.
async fn watchdog_task(watchdog: Arc<Watchdog>, interval: std::time::Duration, token: CancellationToken) {
    let mut ticks = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticks.tick() => (),
            _ = token.cancelled() => break,
        }

        watchdog.sweep(Instant::now());
    }
}

/// Binds the socket and runs the receiver, sender, and watchdog tasks
/// until a shutdown signal arrives, then unreliably notifies every
/// remaining session before returning.
pub async fn run(config: Arc<ServerConfig>, admin_rx: mpsc::UnboundedReceiver<AdminCommand>) -> anyhow::Result<()> {
    let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
    tracing::info!(addr = %config.bind_addr, "listening");

    let sessions = Arc::new(SessionRegistry::new(config.max_concurrent_clients, config.reconnect_code_len));
    let games = Arc::new(GameRegistry::new(config.max_concurrent_clients, config.game_code_len));
    let dispatcher = Arc::new(Dispatcher::new(config.clone(), sessions.clone(), games.clone(), socket.clone()));
    let watchdog = Arc::new(Watchdog::new(config.clone(), sessions.clone(), games.clone()));

    let token = CancellationToken::new();

    let receiver = tokio::spawn(receiver_task(socket.clone(), dispatcher, token.clone()));
    let sender = tokio::spawn(sender_task(socket.clone(), sessions.clone(), config.clone(), token.clone()));
    let watchdog_handle = tokio::spawn(watchdog_task(watchdog, config.watchdog_interval, token.clone()));

    signal_listener(config.clone(), admin_rx, token.clone()).await;
    token.cancel();

    for session in sessions.occupied() {
        let frame = proto::frame::format(1, &proto::outbound::OutboundMessage::ServerShutdown.payload());
        let _ = socket.send_to(frame.as_bytes(), session.addr()).await;
    }

    if let Err(err) = receiver.await {
        tracing::error!("receiver task panicked: {err:#?}");
    }
    if let Err(err) = sender.await {
        tracing::error!("sender task panicked: {err:#?}");
    }
    if let Err(err) = watchdog_handle.await {
        tracing::error!("watchdog task panicked: {err:#?}");
    }

    Ok(())
}
