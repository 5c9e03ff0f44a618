//! Run control for the HID daemon.
//!
//! The daemon runs in exactly one [`Mode`], chosen before anything is
//! opened. [`Daemon`] is generic over the transport, resolver, handoff and
//! inquiry so every mode can run against in-memory doubles.

pub mod error;

pub use error::RunError;

use std::fmt;
use std::time::Duration;

use hidd_discovery::{DiscoveryDriver, Inquiry};
use hidd_protocol::BdAddr;
use hidd_protocol::constants::{
    DEFAULT_BACKLOG, DEFAULT_IDLE_TIMEOUT_MINUTES, DEFAULT_INQUIRY_LENGTH,
};
use hidd_session::{
    DescriptorResolver, PairingCoordinator, PairingPolicy, PairingServer, SessionHandoff,
};
use hidd_transport::Transport;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// What the daemon does this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Accept sessions from peers until cancelled.
    Server,
    /// Scan once and pair every HID device found.
    Search,
    /// Pair with one known device.
    Connect(BdAddr),
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Server => f.write_str("server"),
            Mode::Search => f.write_str("search"),
            Mode::Connect(remote) => write!(f, "connect {remote}"),
        }
    }
}

/// Resolved run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Local adapter address; `BdAddr::ANY` lets the kernel choose.
    pub local: BdAddr,
    pub idle_timeout: Duration,
    pub backlog: u32,
    pub policy: PairingPolicy,
    /// Inquiry length in units of 1.28 s.
    pub inquiry_length: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local: BdAddr::ANY,
            idle_timeout: Duration::from_secs(u64::from(DEFAULT_IDLE_TIMEOUT_MINUTES) * 60),
            backlog: DEFAULT_BACKLOG,
            policy: PairingPolicy::default(),
            inquiry_length: DEFAULT_INQUIRY_LENGTH,
        }
    }
}

/// Everything a run needs, wired but not yet started.
pub struct Daemon<T, R, H, Q> {
    transport: T,
    resolver: R,
    handoff: H,
    inquiry: Q,
    settings: Settings,
}

impl<T, R, H, Q> Daemon<T, R, H, Q>
where
    T: Transport,
    R: DescriptorResolver,
    H: SessionHandoff,
    Q: Inquiry,
{
    pub fn new(transport: T, resolver: R, handoff: H, inquiry: Q, settings: Settings) -> Self {
        Self {
            transport,
            resolver,
            handoff,
            inquiry,
            settings,
        }
    }

    /// Runs `mode` to completion. Server mode returns once `cancel` fires;
    /// the one-shot modes ignore it.
    pub async fn run(self, mode: Mode, cancel: &CancellationToken) -> Result<(), RunError> {
        let Self {
            transport,
            resolver,
            handoff,
            inquiry,
            settings,
        } = self;

        let mut coordinator = PairingCoordinator::new(
            transport,
            resolver,
            handoff,
            settings.local,
            settings.idle_timeout,
        );
        info!(%mode, local = %settings.local, idle_timeout = ?settings.idle_timeout, "starting");

        match mode {
            Mode::Server => {
                let mut server = PairingServer::bind(coordinator, settings.backlog, settings.policy)?;
                server.run(cancel).await;
                Ok(())
            }
            Mode::Connect(remote) => {
                coordinator.connect(remote)?;
                Ok(())
            }
            Mode::Search => {
                let driver = DiscoveryDriver::new(inquiry, settings.inquiry_length);
                let report = driver.run(&mut coordinator)?;
                info!(
                    found = report.found.len(),
                    attempted = report.attempted.len(),
                    paired = report.paired.len(),
                    "search finished"
                );
                match report.failed.into_iter().next() {
                    Some((_, first)) => Err(first.into()),
                    None => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hidd_discovery::{DiscoveryError, InquiryResponse};
    use hidd_protocol::{ChannelRole, DeviceClass, SessionMetadata};
    use hidd_session::mock::{RecordingHandoff, StaticResolver};
    use hidd_transport::mock::MockTransport;

    use super::*;

    type Scan = fn(BdAddr, u8) -> Result<Vec<InquiryResponse>, DiscoveryError>;

    fn peer() -> BdAddr {
        "00:1F:20:12:34:56".parse().unwrap()
    }

    fn no_scan(_: BdAddr, _: u8) -> Result<Vec<InquiryResponse>, DiscoveryError> {
        Ok(Vec::new())
    }

    fn one_hid(_: BdAddr, _: u8) -> Result<Vec<InquiryResponse>, DiscoveryError> {
        Ok(vec![InquiryResponse::new(
            "00:1F:20:12:34:56".parse().unwrap(),
            DeviceClass::new([0x40, 0x25, 0x00]),
        )])
    }

    fn daemon(
        transport: &MockTransport,
        resolver: StaticResolver,
        scan: Scan,
    ) -> Daemon<MockTransport, StaticResolver, RecordingHandoff, Scan> {
        Daemon::new(
            transport.clone(),
            resolver,
            RecordingHandoff::new(),
            scan,
            Settings::default(),
        )
    }

    fn pad() -> SessionMetadata {
        SessionMetadata {
            name: "TestPad".into(),
            ..SessionMetadata::default()
        }
    }

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.idle_timeout, Duration::from_secs(1800));
        assert_eq!(settings.backlog, 10);
        assert_eq!(settings.inquiry_length, 8);
        assert!(matches!(settings.policy, PairingPolicy::Correlated { .. }));
    }

    #[tokio::test]
    async fn connect_mode_succeeds() {
        let transport = MockTransport::new(BdAddr::ANY);
        let d = daemon(&transport, StaticResolver::ok(pad()), no_scan);
        d.run(Mode::Connect(peer()), &CancellationToken::new()).await.unwrap();
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test]
    async fn connect_mode_maps_resolution_failure() {
        let transport = MockTransport::new(BdAddr::ANY);
        let d = daemon(&transport, StaticResolver::no_hid(), no_scan);
        let err = d
            .run(Mode::Connect(peer()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn search_mode_reports_candidate_failure() {
        let transport = MockTransport::new(BdAddr::ANY);
        transport.refuse(peer(), ChannelRole::Control);
        let d = daemon(&transport, StaticResolver::ok(pad()), one_hid);
        let err = d.run(Mode::Search, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn server_mode_listener_failure_is_transport_error() {
        let transport = MockTransport::new(BdAddr::ANY);
        transport.refuse_listen(ChannelRole::Control);
        let d = daemon(&transport, StaticResolver::ok(pad()), no_scan);
        let err = d.run(Mode::Server, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunError::Transport(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn server_mode_returns_on_cancel() {
        let transport = MockTransport::new(BdAddr::ANY);
        let d = daemon(&transport, StaticResolver::ok(pad()), no_scan);
        let cancel = CancellationToken::new();
        cancel.cancel();
        d.run(Mode::Server, &cancel).await.unwrap();
    }
}
