//! dgbridge
//!
//! Runs a console process (e.g. a game server) and bridges its text I/O
//! with a Discord channel through a user-defined rule set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use dgbridge_core::tracing_init::{default_filter, init_tracing};
use dgbridge_core::{load_rules, load_user_directory};
use dgbridge_daemon::discord::{DEFAULT_API_BASE, DiscordClient, DiscordConfig, DiscordPoller};
use dgbridge_daemon::relay::{DiscordRelay, RelayConfig};
use dgbridge_daemon::subprocess::{SpawnConfig, SubprocessBuses, SubprocessManager};

/// Lower bound for the Discord poll interval.
const MIN_POLL_INTERVAL_MS: u64 = 250;

/// How long relay jobs may keep sending the last lines after the
/// subprocess stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "dgbridge")]
#[command(version, about = "Bridge a console process with a Discord channel")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DGBRIDGE_TOKEN", hide_env_values = true)]
    token: String,

    /// Id of the Discord channel to relay to and from
    #[arg(long, env = "DGBRIDGE_CHANNEL_ID")]
    channel_id: String,

    /// Rules file (JSON)
    #[arg(short, long, env = "DGBRIDGE_RULES")]
    rules: PathBuf,

    /// File mapping in-game names to Discord user ids, for mentions (JSON)
    #[arg(short, long, env = "DGBRIDGE_USERS")]
    users: Option<PathBuf>,

    /// Working directory for the subprocess (defaults to the current directory)
    #[arg(long, env = "DGBRIDGE_CWD")]
    cwd: Option<PathBuf>,

    /// Milliseconds between polls for new Discord messages
    #[arg(long, default_value_t = 1000, env = "DGBRIDGE_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Seconds to wait for graceful subprocess shutdown before SIGKILL
    #[arg(long, default_value_t = 10, env = "DGBRIDGE_TERMINATE_TIMEOUT")]
    terminate_timeout: u64,

    /// Discord API base URL
    #[arg(long, default_value = DEFAULT_API_BASE, env = "DGBRIDGE_API_BASE")]
    api_base: String,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, default_value = "info", env = "DGBRIDGE_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "DGBRIDGE_LOG_JSON")]
    log_json: bool,

    /// Command to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(
        &default_filter("dgbridge_daemon", &args.log_level),
        args.log_json,
    );
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?args.command,
        channel_id = %args.channel_id,
        "Starting dgbridge"
    );

    let rules = load_rules(&args.rules)
        .with_context(|| format!("Failed to load rules file {}", args.rules.display()))?;
    let users = load_user_directory(args.users.as_deref()).context("Failed to load user map")?;

    let client = Arc::new(DiscordClient::new(&DiscordConfig {
        api_base: args.api_base.clone(),
        token: args.token.clone(),
    })?);
    let mut poller = DiscordPoller::connect(Arc::clone(&client), args.channel_id.clone())
        .await
        .context("Failed to connect to Discord")?;

    let relay = Arc::new(DiscordRelay::new(
        RelayConfig::new(args.channel_id.clone()),
        Arc::new(rules),
        Arc::new(users),
        client,
    ));

    // Relay jobs subscribe before the process starts so early output is kept.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let buses = SubprocessBuses::default();
    let stdout_job = relay.spawn_outbound("stdout", &buses.stdout_line, shutdown_rx.clone());
    let stderr_job = relay.spawn_outbound("stderr", &buses.stderr_line, shutdown_rx);

    let (program, program_args) = args
        .command
        .split_first()
        .context("No command given")?;
    let working_directory = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };
    let spawn_config = SpawnConfig::new(program, program_args.to_vec())
        .with_working_directory(working_directory)
        .with_terminate_timeout(Duration::from_secs(args.terminate_timeout));
    let subprocess = SubprocessManager::start_with_buses(spawn_config, buses)?;
    let stdin = subprocess.stdin_writer();

    let mut ticker = tokio::time::interval(Duration::from_millis(
        args.poll_interval_ms.max(MIN_POLL_INTERVAL_MS),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let signal = shutdown_signal();
    tokio::pin!(signal);

    info!(pid = subprocess.pid(), "Bridge ready");

    loop {
        tokio::select! {
            _ = ticker.tick() => match poller.poll().await {
                Ok(messages) => {
                    for message in &messages {
                        relay.handle_inbound(message, &stdin);
                    }
                }
                Err(e) => warn!(error = %e, "Failed to poll Discord channel"),
            },
            exit = subprocess.wait() => {
                info!(code = ?exit.code(), "Subprocess exited, shutting down");
                break;
            }
            () = &mut signal => break,
        }
    }

    let exit = subprocess.stop().await;

    // Output buses close at EOF; give the jobs a moment to send what is left.
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        let _ = stdout_job.await;
        let _ = stderr_job.await;
    })
    .await;
    if drained.is_err() {
        warn!("Relay jobs did not finish in time, dropping remaining lines");
    }
    let _ = shutdown_tx.send(true);

    info!(code = ?exit.code(), "dgbridge stopped");
    Ok(())
}

/// Resolves on Ctrl+C or (on unix) SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C shutdown signal"),
        () = sigterm => info!("Received SIGTERM shutdown signal"),
    }
}
