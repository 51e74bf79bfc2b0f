use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::runtime;

use ludo::cli;
use ludo::config::ServerConfig;
use ludo::tasks;

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args(std::env::args().skip(1)).context("usage: ludo <ip> <port> [logfile] [log_level] [verbose_level]")?;

    let _file_guard = init_logging(&args)?;
    tracing::info!(verbose = args.verbose_level, "starting");

    let config = Arc::new(ServerConfig::new(args.bind_addr));

    let runtime = runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .thread_name_fn(|| {
            static THREAD_COUNTER: AtomicU16 = AtomicU16::new(1);
            format!("ludo-{}", THREAD_COUNTER.fetch_add(1, Ordering::Relaxed))
        })
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let admin_rx = cli::spawn_stdin_listener();
        tasks::run(config, admin_rx).await
    })
}

/// Installs `tracing_subscriber`, optionally tee'ing to a rolling file
/// appender when `[logfile]` was given (spec.md §4.7), and the
/// `tokio-console` diagnostics layer when that feature is enabled
/// (matching `core/src/main.rs`'s feature-gated `init_logging`). The
/// returned guard must be kept alive for the life of the process or
/// buffered log lines are lost on exit.
fn init_logging(args: &cli::Args) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let max_level = cli::log_level_to_filter(args.log_level)?;
    let env_filter = EnvFilter::try_from_env("LUDO_LOG").unwrap_or_else(|_| EnvFilter::new(max_level.to_string()));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).with_filter(env_filter);

    #[cfg(feature = "tokio-console")]
    let console_layer = console_subscriber::spawn();

    let (file_layer, guard) = match &args.logfile {
        Some(path) => {
            let directory = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let filename = std::path::Path::new(path).file_name().context("invalid logfile path")?;
            let appender = tracing_appender::rolling::daily(directory, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(stdout_layer).with(file_layer);

    #[cfg(feature = "tokio-console")]
    registry.with(console_layer).init();
    #[cfg(not(feature = "tokio-console"))]
    registry.init();

    Ok(guard)
}
