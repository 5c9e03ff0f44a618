//! Wires the Linux implementations together and runs the chosen mode.

use std::time::Duration;

use hidd_daemon::{Daemon, Mode, RunError, Settings};
use hidd_discovery::{HciInquiry, hci};
use hidd_protocol::{AdapterSelector, BdAddr};
use hidd_session::{HidpHandoff, SdpResolver};
use hidd_transport::L2capTransport;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::Config;

/// Runs the daemon on a single-threaded runtime until its mode completes.
pub fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_mode(cli, config))
}

async fn run_mode(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let mode = cli.mode();
    let selector = cli.device.or(config.device).unwrap_or_default();
    let local = local_address(selector)?;
    tracing::info!(adapter = %selector, %local, "adapter selected");

    let handoff = HidpHandoff::open().map_err(|e| RunError::Setup(e.to_string()))?;

    let settings = Settings {
        local,
        idle_timeout: cli
            .idle_timeout
            .map(|minutes| Duration::from_secs(u64::from(minutes) * 60))
            .unwrap_or_else(|| config.idle_timeout()),
        backlog: config.backlog,
        policy: config.policy(),
        inquiry_length: config.inquiry_length,
    };

    let cancel = CancellationToken::new();
    // One-shot modes block in connect and resolve, so only the server
    // takes over the termination signals.
    if mode == Mode::Server {
        watch_signals(cancel.clone())?;
    }

    let daemon = Daemon::new(L2capTransport::new(), SdpResolver, handoff, HciInquiry, settings);
    daemon.run(mode, &cancel).await?;
    Ok(())
}

/// The address to bind to for `selector`. `Any` stays [`BdAddr::ANY`] so
/// the kernel routes per connection.
fn local_address(selector: AdapterSelector) -> Result<BdAddr, RunError> {
    if selector == AdapterSelector::Any {
        return Ok(BdAddr::ANY);
    }
    let adapter = hci::resolve_adapter(selector)
        .map_err(|e| RunError::Setup(format!("adapter {selector}: {e}")))?;
    if !adapter.up {
        tracing::warn!(adapter = %adapter.name, "adapter is down");
    }
    Ok(adapter.address)
}

/// Cancels `cancel` on SIGTERM or SIGINT. SIGHUP is swallowed.
fn watch_signals(cancel: CancellationToken) -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = term.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    break;
                }
                _ = int.recv() => {
                    tracing::info!("SIGINT received, shutting down");
                    break;
                }
                _ = hup.recv() => tracing::debug!("SIGHUP ignored"),
            }
        }
        cancel.cancel();
    });
    Ok(())
}

/// Process exit status for a failed run. Anything that is not a
/// [`RunError`] happened during setup.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<RunError>()
        .map_or(1, RunError::exit_code)
}
