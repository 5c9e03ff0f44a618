//! Listening role: accept HID channels from peers until cancelled.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use hidd_protocol::constants::{DEFAULT_PAIR_WINDOW, MIN_PAIR_WINDOW, POLL_INTERVAL};
use hidd_protocol::{BdAddr, ChannelRole};
use hidd_transport::{Channel, Listener, Transport, TransportError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{PairingCoordinator, PairingState};
use crate::error::PairingError;
use crate::handoff::SessionHandoff;
use crate::resolver::DescriptorResolver;

/// How accepted channels are matched into pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Readiness on either listener accepts on both, back to back, and the
    /// two channels must come from the same peer.
    Immediate,
    /// Each accepted channel waits, keyed by peer address, up to `window`
    /// for its partner.
    Correlated { window: Duration },
}

impl Default for PairingPolicy {
    fn default() -> Self {
        PairingPolicy::Correlated {
            window: DEFAULT_PAIR_WINDOW,
        }
    }
}

impl fmt::Display for PairingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingPolicy::Immediate => f.write_str("immediate"),
            PairingPolicy::Correlated { window } => write!(f, "correlated ({window:?})"),
        }
    }
}

/// Counters over the server's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    /// Channels accepted on either listener.
    pub accepted: u64,
    /// Sessions handed to the driver.
    pub sessions: u64,
    /// Attempts that ended without a session, expiries included.
    pub failures: u64,
    /// Half-pairs closed because their partner never came.
    pub expired: u64,
}

struct HalfPair<C> {
    control: Option<C>,
    interrupt: Option<C>,
    deadline: Instant,
}

/// Accepted channels waiting for their partner, keyed by peer address.
pub struct PendingPairs<C> {
    pairs: HashMap<BdAddr, HalfPair<C>>,
    window: Duration,
}

impl<C: Channel> PendingPairs<C> {
    pub fn new(window: Duration) -> Self {
        Self {
            pairs: HashMap::new(),
            window,
        }
    }

    /// Files `channel` under `remote`. Returns `(control, interrupt)` once
    /// both halves are present. A second channel of the same role from the
    /// same peer replaces and closes the first.
    pub fn insert(&mut self, remote: BdAddr, channel: C, now: Instant) -> Option<(C, C)> {
        let role = channel.role();
        let deadline = now + self.window;
        let entry = self.pairs.entry(remote).or_insert_with(|| HalfPair {
            control: None,
            interrupt: None,
            deadline,
        });
        entry.deadline = deadline;

        let slot = match role {
            ChannelRole::Control => &mut entry.control,
            ChannelRole::Interrupt => &mut entry.interrupt,
        };
        if let Some(mut older) = slot.replace(channel) {
            debug!(%remote, %role, "replacing older half");
            older.close();
        }

        if entry.control.is_some() && entry.interrupt.is_some() {
            let pair = self.pairs.remove(&remote)?;
            return pair.control.zip(pair.interrupt);
        }
        None
    }

    /// Closes every half whose deadline has passed and reports them.
    pub fn expire(&mut self, now: Instant) -> Vec<(BdAddr, ChannelRole)> {
        let stale: Vec<BdAddr> = self
            .pairs
            .iter()
            .filter(|(_, half)| half.deadline <= now)
            .map(|(remote, _)| *remote)
            .collect();

        let mut expired = Vec::new();
        for remote in stale {
            if let Some(half) = self.pairs.remove(&remote) {
                for mut chan in [half.control, half.interrupt].into_iter().flatten() {
                    expired.push((remote, chan.role()));
                    chan.close();
                }
            }
        }
        expired
    }

    /// Closes every waiting half; returns how many there were.
    pub fn clear(&mut self) -> usize {
        let mut closed = 0;
        for (_, half) in self.pairs.drain() {
            for mut chan in [half.control, half.interrupt].into_iter().flatten() {
                chan.close();
                closed += 1;
            }
        }
        closed
    }

    /// Number of peers with a waiting half.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

type Accepted<C> = Result<(C, BdAddr), TransportError>;

enum Event<C> {
    Accepted(ChannelRole, Accepted<C>),
    Tick,
}

/// Owns both listening channels and feeds completed pairs to the
/// coordinator, one at a time.
pub struct PairingServer<T: Transport, R, H> {
    coordinator: PairingCoordinator<T, R, H>,
    control: T::Listener,
    interrupt: T::Listener,
    policy: PairingPolicy,
    pending: PendingPairs<T::Channel>,
    stats: ServerStats,
}

impl<T, R, H> PairingServer<T, R, H>
where
    T: Transport,
    R: DescriptorResolver,
    H: SessionHandoff,
{
    /// Opens the control and interrupt listeners on the coordinator's
    /// adapter. Failing to obtain either is fatal for the server. A
    /// correlation window shorter than [`MIN_PAIR_WINDOW`] is raised to it.
    pub fn bind(
        coordinator: PairingCoordinator<T, R, H>,
        backlog: u32,
        policy: PairingPolicy,
    ) -> Result<Self, PairingError> {
        let local = coordinator.local();
        let control = coordinator
            .transport()
            .listen(local, ChannelRole::Control, backlog)?;
        let interrupt = coordinator
            .transport()
            .listen(local, ChannelRole::Interrupt, backlog)?;

        let (policy, window) = match policy {
            PairingPolicy::Correlated { window } => {
                let window = window.max(MIN_PAIR_WINDOW);
                (PairingPolicy::Correlated { window }, window)
            }
            PairingPolicy::Immediate => (policy, DEFAULT_PAIR_WINDOW),
        };

        Ok(Self {
            coordinator,
            control,
            interrupt,
            policy,
            pending: PendingPairs::new(window),
            stats: ServerStats::default(),
        })
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn state(&self) -> PairingState {
        match self.coordinator.state() {
            PairingState::Idle if !self.pending.is_empty() => PairingState::AwaitingBoth,
            state => state,
        }
    }

    /// Accepts and pairs channels until `cancel` fires. Attempt failures
    /// are logged and counted; none of them stops the loop.
    pub async fn run(&mut self, cancel: &CancellationToken) -> ServerStats {
        info!(local = %self.coordinator.local(), policy = %self.policy, "waiting for HID peers");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.control.accept() => Event::Accepted(ChannelRole::Control, result),
                result = self.interrupt.accept() => Event::Accepted(ChannelRole::Interrupt, result),
                _ = tokio::time::sleep(POLL_INTERVAL) => Event::Tick,
            };

            if let Event::Accepted(role, result) = event {
                match self.policy {
                    PairingPolicy::Correlated { .. } => self.on_correlated(role, result),
                    PairingPolicy::Immediate => self.on_immediate(role, result).await,
                }
            }
            self.expire_pending(Instant::now());
        }

        let dropped = self.pending.clear();
        if dropped > 0 {
            info!(channels = dropped, "closed waiting half-pairs");
        }
        self.coordinator.reset();
        info!(
            accepted = self.stats.accepted,
            sessions = self.stats.sessions,
            failures = self.stats.failures,
            expired = self.stats.expired,
            "server stopped"
        );
        self.stats
    }

    fn on_correlated(&mut self, role: ChannelRole, result: Accepted<T::Channel>) {
        let (channel, remote) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                self.stats.failures += 1;
                warn!(%role, "accept failed: {e}");
                return;
            }
        };
        self.stats.accepted += 1;
        debug!(%remote, %role, "channel accepted");

        match self.pending.insert(remote, channel, Instant::now()) {
            Some((control, interrupt)) => self.complete(control, interrupt, remote),
            None => self.coordinator.awaiting(),
        }
    }

    async fn on_immediate(&mut self, role: ChannelRole, first: Accepted<T::Channel>) {
        self.coordinator.awaiting();

        debug!(%role, "waiting for the {} channel", role.partner());
        let second = match role.partner() {
            ChannelRole::Control => self.control.accept().await,
            ChannelRole::Interrupt => self.interrupt.accept().await,
        };
        let (control, interrupt) = match role {
            ChannelRole::Control => (first, second),
            ChannelRole::Interrupt => (second, first),
        };
        self.stats.accepted += u64::from(control.is_ok()) + u64::from(interrupt.is_ok());

        // Any accepted half is dropped, and so closed, on the error paths.
        let (control, interrupt) = match (control, interrupt) {
            (Ok(control), Ok(interrupt)) => (control, interrupt),
            (Err(e), _) | (_, Err(e)) => {
                let remote = BdAddr::NONE;
                self.stats.failures += 1;
                self.coordinator.fail(remote, e.into());
                self.coordinator.reset();
                return;
            }
        };

        let ((control, control_peer), (interrupt, interrupt_peer)) = (control, interrupt);
        if control_peer != interrupt_peer {
            drop((control, interrupt));
            self.stats.failures += 1;
            self.coordinator.fail(
                control_peer,
                PairingError::PeerMismatch {
                    control: control_peer,
                    interrupt: interrupt_peer,
                },
            );
            self.coordinator.reset();
            return;
        }

        self.complete(control, interrupt, control_peer);
    }

    fn complete(&mut self, control: T::Channel, interrupt: T::Channel, remote: BdAddr) {
        match self.coordinator.establish(control, interrupt, Some(remote)) {
            Ok(_) => self.stats.sessions += 1,
            Err(_) => self.stats.failures += 1,
        }
        self.coordinator.reset();
        if !self.pending.is_empty() {
            self.coordinator.awaiting();
        }
    }

    fn expire_pending(&mut self, now: Instant) {
        let expired = self.pending.expire(now);
        if expired.is_empty() {
            return;
        }

        for (remote, role) in expired {
            self.stats.expired += 1;
            self.stats.failures += 1;
            warn!(%remote, "{}", PairingError::Expired { remote, role });
        }
        if self.pending.is_empty() && self.coordinator.state() == PairingState::AwaitingBoth {
            self.coordinator.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use hidd_protocol::SessionMetadata;
    use hidd_transport::mock::{MockChannel, MockTransport};

    use super::*;
    use crate::mock::{RecordingHandoff, StaticResolver};

    fn addr(last: u8) -> BdAddr {
        BdAddr::from_be_bytes([0x00, 0x1f, 0x20, 0x00, 0x00, last])
    }

    fn pad() -> SessionMetadata {
        SessionMetadata {
            name: "TestPad".into(),
            descriptor: vec![0x05, 0x01, 0x09, 0x05],
            ..SessionMetadata::default()
        }
    }

    type TestServer = PairingServer<MockTransport, StaticResolver, RecordingHandoff>;

    fn server(
        transport: &MockTransport,
        resolver: StaticResolver,
        handoff: RecordingHandoff,
        policy: PairingPolicy,
    ) -> TestServer {
        let coordinator = PairingCoordinator::new(
            transport.clone(),
            resolver,
            handoff,
            BdAddr::ANY,
            Duration::from_secs(1800),
        );
        PairingServer::bind(coordinator, 10, policy).unwrap()
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    fn channel(transport: &MockTransport, remote: BdAddr, role: ChannelRole) -> MockChannel {
        transport.connect(BdAddr::ANY, remote, role).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn pending_pairs_match_in_any_order() {
        let transport = MockTransport::new(BdAddr::ANY);
        let mut pending = PendingPairs::new(Duration::from_secs(5));
        let now = Instant::now();

        assert!(pending.insert(addr(1), channel(&transport, addr(1), ChannelRole::Interrupt), now).is_none());
        assert!(pending.insert(addr(2), channel(&transport, addr(2), ChannelRole::Control), now).is_none());
        assert_eq!(pending.len(), 2);

        let (control, interrupt) = pending
            .insert(addr(1), channel(&transport, addr(1), ChannelRole::Control), now)
            .unwrap();
        assert_eq!(control.role(), ChannelRole::Control);
        assert_eq!(interrupt.role(), ChannelRole::Interrupt);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_pairs_replace_duplicates_and_expire() {
        let transport = MockTransport::new(BdAddr::ANY);
        let mut pending = PendingPairs::new(Duration::from_secs(5));
        let start = Instant::now();

        pending.insert(addr(1), channel(&transport, addr(1), ChannelRole::Control), start);
        pending.insert(addr(1), channel(&transport, addr(1), ChannelRole::Control), start);
        assert_eq!(transport.open_channels(), 1);

        assert!(pending.expire(start + Duration::from_secs(4)).is_empty());
        let expired = pending.expire(start + Duration::from_secs(5));
        assert_eq!(expired, vec![(addr(1), ChannelRole::Control)]);
        assert_eq!(transport.open_channels(), 0);
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn correlated_pairs_by_address() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::default(),
        );

        transport.incoming(ChannelRole::Interrupt, addr(1));
        transport.incoming(ChannelRole::Control, addr(2));
        transport.incoming(ChannelRole::Control, addr(1));

        let stats = server.run(&cancel_after(Duration::from_secs(1))).await;

        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.failures, 0);
        let calls = handoff.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].remote, addr(1));
        assert_eq!(calls[0].metadata.idle_timeout, Duration::from_secs(1800));
        // The lone half from addr(2) is closed on shutdown.
        assert_eq!(transport.open_channels(), 0);
        assert_eq!(server.state(), PairingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn correlated_expires_lonely_halves() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::Correlated {
                window: Duration::from_secs(2),
            },
        );

        transport.incoming(ChannelRole::Control, addr(3));
        let stats = server.run(&cancel_after(Duration::from_secs(3))).await;

        assert_eq!(stats.expired, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.sessions, 0);
        assert!(handoff.calls().is_empty());
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_window_still_pairs() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::Correlated {
                window: Duration::ZERO,
            },
        );
        assert_eq!(
            server.policy,
            PairingPolicy::Correlated {
                window: MIN_PAIR_WINDOW
            }
        );

        transport.incoming(ChannelRole::Control, addr(4));
        transport.incoming(ChannelRole::Interrupt, addr(4));
        let stats = server.run(&cancel_after(Duration::from_secs(1))).await;

        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(handoff.calls().len(), 1);
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_accepts_both_and_hands_off() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::Immediate,
        );

        transport.incoming(ChannelRole::Control, addr(4));
        transport.incoming(ChannelRole::Interrupt, addr(4));
        let stats = server.run(&cancel_after(Duration::from_millis(500))).await;

        assert_eq!(stats.sessions, 1);
        assert_eq!(handoff.calls()[0].roles, (ChannelRole::Control, ChannelRole::Interrupt));
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_failed_accept_closes_partner() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::Immediate,
        );

        transport.incoming(ChannelRole::Control, addr(5));
        transport.incoming_failure(ChannelRole::Interrupt);
        let stats = server.run(&cancel_after(Duration::from_millis(500))).await;

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.failures, 1);
        assert!(handoff.calls().is_empty());
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_rejects_mismatched_peers() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            handoff.clone(),
            PairingPolicy::Immediate,
        );

        transport.incoming(ChannelRole::Control, addr(6));
        transport.incoming(ChannelRole::Interrupt, addr(7));
        let stats = server.run(&cancel_after(Duration::from_millis(500))).await;

        assert_eq!(stats.failures, 1);
        assert_eq!(stats.sessions, 0);
        assert!(handoff.calls().is_empty());
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_failure_keeps_serving() {
        let transport = MockTransport::new(BdAddr::ANY);
        let mut server = server(
            &transport,
            StaticResolver::no_hid(),
            RecordingHandoff::new(),
            PairingPolicy::default(),
        );

        for last in [8, 9] {
            transport.incoming(ChannelRole::Control, addr(last));
            transport.incoming(ChannelRole::Interrupt, addr(last));
        }
        let stats = server.run(&cancel_after(Duration::from_secs(1))).await;

        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.failures, 2);
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_idle_loop_promptly() {
        let transport = MockTransport::new(BdAddr::ANY);
        let mut server = server(
            &transport,
            StaticResolver::ok(pad()),
            RecordingHandoff::new(),
            PairingPolicy::default(),
        );

        let start = Instant::now();
        let stats = server.run(&cancel_after(Duration::from_millis(250))).await;
        assert!(start.elapsed() < Duration::from_millis(250) + POLL_INTERVAL);
        assert_eq!(stats, ServerStats::default());
    }

    #[tokio::test]
    async fn listener_failure_is_fatal() {
        let transport = MockTransport::new(BdAddr::ANY);
        transport.refuse_listen(ChannelRole::Interrupt);
        let coordinator = PairingCoordinator::new(
            transport.clone(),
            StaticResolver::ok(pad()),
            RecordingHandoff::new(),
            BdAddr::ANY,
            Duration::from_secs(1800),
        );

        let result = PairingServer::bind(coordinator, 10, PairingPolicy::default());
        assert!(matches!(result, Err(PairingError::Transport(_))));
    }
}
